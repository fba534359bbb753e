//! Animation export for avatar rigs.
//!
//! Two encoders share one clip model:
//!
//! - [`anim`] writes (and reads back) the binary `.anim` clip format.
//! - [`bvh`] samples a clip over a hierarchy built from a reference skeleton
//!   and writes a BVH motion file.
//!
//! ```no_run
//! use avarig_anim::{anim, AnimClip, JointTrack};
//! use glam::Quat;
//!
//! let clip = AnimClip::new(1.0).with_joint(
//!     JointTrack::new("mHead").with_rotation(1.0, Quat::from_rotation_z(0.3)),
//! );
//! anim::write_file(&clip, std::path::Path::new("nod.anim")).unwrap();
//! ```

pub mod anim;
pub mod bvh;
pub mod clip;
pub mod error;

pub use bvh::{BvhJoint, BvhMotion, BvhSkeleton};
pub use clip::{AnimClip, JointTrack, PositionKey, RotationKey};
pub use error::{AnimError, AnimResult};

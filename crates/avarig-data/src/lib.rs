//! Reference data for the avatar rig.
//!
//! This crate owns everything that is read from the skeleton and appearance
//! definitions and never changes afterwards:
//!
//! - [`skeleton`]: the bone hierarchy with control, structural, IK, volume,
//!   and attachment bones, for each rig type and joint type
//! - [`appearance`]: the slider driver graph with its driven chains
//! - [`shape_file`]: reading and writing shape documents
//! - [`cache`]: process-wide shared instances
//!
//! All coordinates are in the rig frame; see [`axis`].

pub mod appearance;
pub mod axis;
pub mod bone_map;
pub mod bundled;
pub mod cache;
pub mod error;
pub mod presets;
pub mod shape_file;
pub mod skeleton;
pub mod xml_tree;

pub use appearance::{BoneDelta, Driver, DriverCategory, DriverGraph, DrivenRef, Gender, MeshTarget};
pub use bone_map::RigFamily;
pub use bundled::DataSource;
pub use error::{DataError, DataResult, ErrorCategory};
pub use presets::{HandPosture, RestPosePreset};
pub use shape_file::{ShapeDocument, ShapeEntry};
pub use skeleton::{Bone, BoneGroup, BoneKind, JointType, RigType, Skeleton, SkeletonSummary};

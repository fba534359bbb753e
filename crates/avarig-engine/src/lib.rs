//! Host-side rig engine for the avatar.
//!
//! The engine works on a plain [`Scene`] of armatures and meshes:
//!
//! - [`shape`]: per-armature slider values and shape files
//! - [`evaluator`]: turns slider values into bone geometry and morph weights
//! - [`bind`]: binds custom meshes so the sliders deform them too
//! - [`joints`]: keeps hand-edited joints across slider changes
//! - [`transfer`]: converts, updates and copies rigs
//!
//! [`RigSystem`] ties these together over shared reference data.
//!
//! ```no_run
//! use avarig_engine::{RigProps, RigSystem, Scene};
//!
//! let rig = RigSystem::bundled()?;
//! let mut scene = Scene::new();
//! rig.create_armature(&mut scene, "Avatar", RigProps::default())?;
//! let report = rig.set_slider(&mut scene, "Avatar", "height_33", 80.0)?;
//! println!("{} bones placed", report.bones_placed);
//! # Ok::<(), avarig_engine::EngineError>(())
//! ```

pub mod bind;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod joints;
pub mod progress;
pub mod report;
pub mod rig;
pub mod scene;
pub mod shape;
pub mod transfer;

pub use config::{CorrectionSettings, EngineConfig, JointStoreOptions};
pub use error::{EngineError, EngineResult};
pub use evaluator::Evaluator;
pub use joints::{JointOffset, JointStore};
pub use progress::{NoProgress, Phase, ProgressHook, RecordingProgress};
pub use report::{BindStatus, EvaluationReport, MeshReport, SkipReason};
pub use rig::RigSystem;
pub use scene::{Armature, EditBone, MeshObject, PoseBone, RigProps, Scene, ShapeKey, SliderSelector};
pub use shape::{ShapeDictionary, ShapeState};
pub use transfer::{OriginSnap, TransferMode, TransferOptions, TransferReport};

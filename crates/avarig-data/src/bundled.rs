//! Reference documents compiled into the crate, and source selection.

use std::path::PathBuf;

use crate::appearance::{self, DriverGraph};
use crate::error::DataResult;
use crate::skeleton::{self, JointType, RigType, Skeleton};

/// Default skeleton definition.
pub const SKELETON_XML: &str = include_str!("../data/avatar_skeleton.xml");

/// Default appearance definition.
pub const APPEARANCE_XML: &str = include_str!("../data/avatar_lad.xml");

/// Default file names inside a data directory.
pub const SKELETON_FILE_NAME: &str = "avatar_skeleton.xml";
pub const APPEARANCE_FILE_NAME: &str = "avatar_lad.xml";

/// Where the reference documents come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DataSource {
    /// The documents embedded in this crate.
    #[default]
    Bundled,
    /// Documents on disk.
    Files {
        skeleton: PathBuf,
        appearance: PathBuf,
    },
}

impl DataSource {
    /// Source reading both default file names from a directory.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        DataSource::Files {
            skeleton: dir.join(SKELETON_FILE_NAME),
            appearance: dir.join(APPEARANCE_FILE_NAME),
        }
    }

    /// Loads a skeleton for the given rig and joint type. Uncached.
    pub fn load_skeleton(&self, rig: RigType, joint: JointType) -> DataResult<Skeleton> {
        match self {
            DataSource::Bundled => skeleton::load_skeleton_str(SKELETON_XML, rig, joint),
            DataSource::Files { skeleton: path, .. } => {
                skeleton::load_skeleton_file(path, rig, joint)
            }
        }
    }

    /// Loads the driver graph. Uncached.
    pub fn load_appearance(&self) -> DataResult<DriverGraph> {
        match self {
            DataSource::Bundled => appearance::load_appearance_str(APPEARANCE_XML),
            DataSource::Files { appearance: path, .. } => appearance::load_appearance_file(path),
        }
    }
}

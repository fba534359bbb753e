//! Error types for the rig engine.

use avarig_data::{DataError, ErrorCategory};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during rig operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reference data could not be loaded.
    #[error(transparent)]
    Data(#[from] DataError),

    /// No armature with this name exists in the scene.
    #[error("Unknown armature '{name}'")]
    UnknownArmature { name: String },

    /// No mesh with this name exists in the scene.
    #[error("Unknown mesh '{name}'")]
    UnknownMesh { name: String },

    /// The bone does not exist on the armature.
    #[error("Unknown bone '{bone}' on armature '{armature}'")]
    UnknownBone { armature: String, bone: String },

    /// The slider id is not a user-editable driver.
    #[error("Unknown slider '{id}'")]
    UnknownSlider { id: String },

    /// Stored bind arrays no longer match the mesh.
    #[error("Bind data of mesh '{mesh}' holds {stored} vertices but the mesh has {current}")]
    BindMismatch {
        mesh: String,
        stored: usize,
        current: usize,
    },

    /// The mesh has no bind data.
    #[error("Mesh '{mesh}' is not bound to the slider system")]
    NotBound { mesh: String },

    /// The operation found problems the caller has to acknowledge.
    #[error("Confirmation required: {}", issues.join("; "))]
    ConfirmationRequired { issues: Vec<String> },

    /// System meshes follow shape keys and cannot be bound.
    #[error("Mesh '{mesh}' is a system mesh")]
    SystemMesh { mesh: String },

    /// The source rig uses a naming family that cannot be converted.
    #[error("Unsupported rig family for '{armature}'")]
    UnsupportedFamily { armature: String },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new unknown armature error.
    pub fn unknown_armature(name: impl Into<String>) -> Self {
        Self::UnknownArmature { name: name.into() }
    }

    /// Creates a new unknown mesh error.
    pub fn unknown_mesh(name: impl Into<String>) -> Self {
        Self::UnknownMesh { name: name.into() }
    }

    /// Creates a new unknown bone error.
    pub fn unknown_bone(armature: impl Into<String>, bone: impl Into<String>) -> Self {
        Self::UnknownBone {
            armature: armature.into(),
            bone: bone.into(),
        }
    }

    /// Creates a new unknown slider error.
    pub fn unknown_slider(id: impl Into<String>) -> Self {
        Self::UnknownSlider { id: id.into() }
    }
}

impl ErrorCategory for EngineError {
    fn code(&self) -> &'static str {
        match self {
            EngineError::Data(inner) => inner.code(),
            EngineError::UnknownArmature { .. } => "ENGINE_001",
            EngineError::UnknownMesh { .. } => "ENGINE_002",
            EngineError::UnknownBone { .. } => "ENGINE_003",
            EngineError::UnknownSlider { .. } => "ENGINE_004",
            EngineError::BindMismatch { .. } => "ENGINE_005",
            EngineError::NotBound { .. } => "ENGINE_006",
            EngineError::ConfirmationRequired { .. } => "ENGINE_007",
            EngineError::UnsupportedFamily { .. } => "ENGINE_008",
            EngineError::Config { .. } => "ENGINE_009",
            EngineError::Io(_) => "ENGINE_010",
            EngineError::SystemMesh { .. } => "ENGINE_011",
        }
    }

    fn category(&self) -> &'static str {
        match self {
            EngineError::Data(inner) => inner.category(),
            EngineError::Config { .. } | EngineError::Io(_) => "config",
            _ => "engine",
        }
    }
}

//! Error types for loading reference data.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for reference data operations.
pub type DataResult<T> = Result<T, DataError>;

/// Stable error codes shared by all crates of the workspace.
///
/// Hosts surface `code()` to users and bucket errors by `category()`.
pub trait ErrorCategory: std::error::Error {
    /// Returns the stable error code (e.g., "DATA_001").
    fn code(&self) -> &'static str;

    /// Returns the error category (e.g., "data").
    fn category(&self) -> &'static str;
}

/// Errors raised while reading skeleton, appearance, or shape documents.
#[derive(Debug, Error)]
pub enum DataError {
    /// Skeleton file could not be found or opened.
    #[error("Skeleton file not found: {path}")]
    SkeletonFileMissing { path: PathBuf },

    /// Skeleton document is not a valid skeleton definition.
    #[error("Failed to parse skeleton definition: {message}")]
    SkeletonParseError { message: String },

    /// Appearance file could not be found or opened.
    #[error("Appearance file not found: {path}")]
    AppearanceFileMissing { path: PathBuf },

    /// Appearance document is not a valid appearance definition.
    #[error("Failed to parse appearance definition: {message}")]
    AppearanceParseError { message: String },

    /// The skeleton document has no mandatory root bone.
    #[error("Skeleton definition lacks the mandatory root bone '{name}'")]
    MissingRootBone { name: String },

    /// Driven chains loop back onto themselves.
    #[error("Driven chain forms a cycle: {}", chain.join(" -> "))]
    DrivenCycle { chain: Vec<String> },

    /// A numeric attribute could not be parsed.
    #[error("Invalid number '{value}' in attribute '{attribute}'")]
    InvalidNumber { attribute: String, value: String },

    /// The XML reader rejected the document.
    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    /// The XML writer failed.
    #[error("XML write error: {0}")]
    XmlWrite(#[from] xml::writer::Error),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Creates a new skeleton parse error.
    pub fn skeleton_parse(message: impl Into<String>) -> Self {
        Self::SkeletonParseError {
            message: message.into(),
        }
    }

    /// Creates a new appearance parse error.
    pub fn appearance_parse(message: impl Into<String>) -> Self {
        Self::AppearanceParseError {
            message: message.into(),
        }
    }

    /// Creates a new invalid number error.
    pub fn invalid_number(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidNumber {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl ErrorCategory for DataError {
    fn code(&self) -> &'static str {
        match self {
            DataError::SkeletonFileMissing { .. } => "DATA_001",
            DataError::SkeletonParseError { .. } => "DATA_002",
            DataError::AppearanceFileMissing { .. } => "DATA_003",
            DataError::AppearanceParseError { .. } => "DATA_004",
            DataError::MissingRootBone { .. } => "DATA_005",
            DataError::DrivenCycle { .. } => "DATA_006",
            DataError::InvalidNumber { .. } => "DATA_007",
            DataError::Xml(_) => "DATA_008",
            DataError::XmlWrite(_) => "DATA_009",
            DataError::Io(_) => "DATA_010",
        }
    }

    fn category(&self) -> &'static str {
        "data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::MissingRootBone {
            name: "mPelvis".to_string(),
        };
        assert!(err.to_string().contains("mPelvis"));

        let err = DataError::DrivenCycle {
            chain: vec!["a_1".into(), "b_2".into(), "a_1".into()],
        };
        assert_eq!(err.to_string(), "Driven chain forms a cycle: a_1 -> b_2 -> a_1");

        let err = DataError::invalid_number("pos", "1.0 x 2");
        assert!(err.to_string().contains("'pos'"));
    }

    #[test]
    fn test_error_codes() {
        let err = DataError::skeleton_parse("bad");
        assert_eq!(err.code(), "DATA_002");
        assert_eq!(err.category(), "data");

        let err = DataError::appearance_parse("bad");
        assert_eq!(err.code(), "DATA_004");
    }
}

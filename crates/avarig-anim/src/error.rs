//! Error types for animation encoding.

use avarig_data::ErrorCategory;
use thiserror::Error;

/// Result type for animation operations.
pub type AnimResult<T> = Result<T, AnimError>;

/// Errors that can occur while encoding or decoding clips.
#[derive(Debug, Error)]
pub enum AnimError {
    /// The header does not carry a supported version.
    #[error("Unsupported clip version {version}.{sub_version}")]
    InvalidMagic { version: u16, sub_version: u16 },

    /// The input ended inside a record.
    #[error("Clip truncated while reading {context}")]
    Truncated { context: String },

    /// A joint has more keys than the format can address.
    #[error("Joint '{joint}' has {count} keys, at most {max} are allowed")]
    TooManyKeys { joint: String, count: usize, max: usize },

    /// No joint to write.
    #[error("Skeleton has no exportable joints")]
    EmptySkeleton,

    /// A clip description could not be parsed.
    #[error("Invalid clip description: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnimError {
    /// Creates a new truncation error.
    pub fn truncated(context: impl Into<String>) -> Self {
        Self::Truncated {
            context: context.into(),
        }
    }

    /// Maps an unexpected end of input onto [`AnimError::Truncated`].
    pub(crate) fn from_read(err: std::io::Error, context: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::truncated(context)
        } else {
            Self::Io(err)
        }
    }
}

impl ErrorCategory for AnimError {
    fn code(&self) -> &'static str {
        match self {
            AnimError::InvalidMagic { .. } => "ANIM_001",
            AnimError::Truncated { .. } => "ANIM_002",
            AnimError::TooManyKeys { .. } => "ANIM_003",
            AnimError::EmptySkeleton => "ANIM_004",
            AnimError::Json(_) => "ANIM_005",
            AnimError::Io(_) => "ANIM_006",
        }
    }

    fn category(&self) -> &'static str {
        match self {
            AnimError::Io(_) => "io",
            _ => "anim",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnimError::TooManyKeys {
            joint: "mPelvis".into(),
            count: 70000,
            max: 65535,
        };
        assert_eq!(
            err.to_string(),
            "Joint 'mPelvis' has 70000 keys, at most 65535 are allowed"
        );
        assert_eq!(err.code(), "ANIM_003");
    }

    #[test]
    fn test_eof_becomes_truncated() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(AnimError::from_read(eof, "header"), AnimError::Truncated { .. }));
        let other = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(AnimError::from_read(other, "header").category(), "io");
    }
}

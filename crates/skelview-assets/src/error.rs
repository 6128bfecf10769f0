//! Error types for the asset pipeline.

use std::fmt;
use std::path::PathBuf;

use crate::asset::AssetKind;

/// Errors raised by [`crate::binary::BinaryInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The cursor ran past the end of the buffer.
    OutOfBounds {
        /// Offset of the byte that was requested.
        offset: usize,
        /// Length of the buffer.
        len: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::OutOfBounds { offset, len } => {
                write!(f, "read at offset {} past end of {}-byte buffer", offset, len)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors that can occur during asset operations.
#[derive(Debug)]
pub enum AssetError {
    /// The requested asset is not in the cache.
    NotFound {
        /// The locator that was requested.
        path: String,
        /// Error recorded for this locator when its load failed, if any.
        detail: Option<String>,
    },

    /// No tier of the resolver could produce bytes for a locator.
    Resolution {
        /// The locator being resolved.
        path: String,
        /// Description of why the last tier failed.
        message: String,
    },

    /// Failed to read a file from disk.
    IoError {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Bytes were resolved but could not be turned into the requested asset.
    LoaderError {
        /// The locator being loaded.
        path: String,
        /// Description of the error.
        message: String,
    },

    /// Malformed binary input.
    Decode(DecodeError),

    /// The stored asset has a different kind than the caller asked for.
    TypeMismatch {
        /// The locator being accessed.
        path: String,
        /// Kind the caller asked for.
        expected: AssetKind,
        /// Kind actually stored.
        actual: AssetKind,
    },

    /// At least one page of an atlas failed to load.
    AtlasPartialFailure {
        /// The atlas locator.
        atlas: String,
        /// The first failing page, in page order.
        page: String,
    },

    /// A set of selected files does not form a loadable skeleton bundle.
    InvalidBundle {
        /// Description of what is missing.
        message: String,
    },

    /// Generic error with a message.
    Other {
        /// Error message.
        message: String,
    },
}

impl AssetError {
    pub(crate) fn loader(path: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::LoaderError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn resolution(path: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::Resolution {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_bundle(message: impl Into<String>) -> Self {
        AssetError::InvalidBundle {
            message: message.into(),
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path, detail } => match detail {
                Some(detail) => write!(f, "Asset not found: {} ({})", path, detail),
                None => write!(f, "Asset not found: {}", path),
            },
            AssetError::Resolution { path, message } => {
                write!(f, "Couldn't resolve '{}': {}", path, message)
            }
            AssetError::IoError { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::LoaderError { path, message } => {
                write!(f, "Failed to load '{}': {}", path, message)
            }
            AssetError::Decode(err) => write!(f, "Decode error: {}", err),
            AssetError::TypeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Type mismatch for '{}': expected {}, found {}",
                    path, expected, actual
                )
            }
            AssetError::AtlasPartialFailure { atlas, page } => {
                write!(
                    f,
                    "Couldn't load texture atlas page {} of atlas {}",
                    page, atlas
                )
            }
            AssetError::InvalidBundle { message } => {
                write!(f, "Invalid skeleton bundle: {}", message)
            }
            AssetError::Other { message } => {
                write!(f, "Asset error: {}", message)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::IoError { source, .. } => Some(source),
            AssetError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<DecodeError> for AssetError {
    fn from(err: DecodeError) -> Self {
        AssetError::Decode(err)
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_includes_detail() {
        let err = AssetError::NotFound {
            path: "hero.atlas".to_string(),
            detail: Some("page hero2.png failed".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("hero.atlas"));
        assert!(message.contains("hero2.png"));
    }

    #[test]
    fn test_decode_error_source() {
        use std::error::Error;
        let err: AssetError = DecodeError::OutOfBounds { offset: 9, len: 8 }.into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("offset 9"));
    }
}

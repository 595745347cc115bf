//! Error types for IGES file operations.

use brepx_kernel_topo::TopoError;
use thiserror::Error;

/// Errors that can occur while reading or writing IGES files.
#[derive(Error, Debug)]
pub enum IgesError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record does not follow the fixed 80-column layout.
    #[error("IGES format error at line {line}: {message}")]
    Format {
        /// Line number in the file (1-indexed, 0 when not tied to a line).
        line: usize,
        /// Error message.
        message: String,
    },

    /// Directory entry pointer that does not resolve.
    #[error("Missing directory entry: {0}")]
    MissingEntity(usize),

    /// Entity type the reader cannot translate.
    #[error("Unsupported entity type {0}")]
    UnsupportedEntity(i32),

    /// Parameter with the wrong type or out of range.
    #[error("Entity at DE {de}: {message}")]
    BadParameter {
        /// Directory entry of the entity.
        de: usize,
        /// What was wrong.
        message: String,
    },

    /// Null shape handed to the writer.
    #[error("cannot add a null shape")]
    NullShape,

    /// Shape structure the writer cannot encode.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Version string other than the supported ones.
    #[error("unknown IGES version '{0}'")]
    UnknownVersion(String),

    /// Write requested before any shape was added.
    #[error("no shape has been added to the IGES model")]
    EmptyModel,

    /// Rebuilding topology from the file failed.
    #[error("topology error: {0}")]
    Topo(#[from] TopoError),
}

impl IgesError {
    /// Create a format error.
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }

    /// Create a bad-parameter error.
    pub fn bad_parameter(de: usize, message: impl Into<String>) -> Self {
        Self::BadParameter {
            de,
            message: message.into(),
        }
    }
}

/// Result alias for IGES operations.
pub type Result<T> = std::result::Result<T, IgesError>;

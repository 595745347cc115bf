//! Error taxonomy of the exchange layer.

use std::path::PathBuf;
use std::time::Duration;

use brepx_kernel::KernelError;
use thiserror::Error;

/// Errors raised by validation, importers, exporters and dispatch.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The path extension is not accepted by the bound format.
    #[error("{}: extension `{extension}` is not one of [{expected}]", path.display())]
    FormatMismatch {
        /// Offending path.
        path: PathBuf,
        /// Lower-cased extension found on the path (empty when missing).
        extension: String,
        /// Accepted extensions, comma separated.
        expected: String,
    },

    /// The source path is not an existing regular file.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The target directory does not exist.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A value that is not a usable shape was supplied.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// The kernel read the file but produced no usable shape.
    #[error("{}: {reason}", path.display())]
    Integrity {
        /// File that was read.
        path: PathBuf,
        /// What was wrong with the result.
        reason: String,
    },

    /// A format option has an illegal value.
    #[error("invalid value `{value}` for option `{option}`, expected one of [{allowed}]")]
    InvalidOption {
        /// Option name.
        option: String,
        /// Rejected value.
        value: String,
        /// Legal values, comma separated.
        allowed: String,
    },

    /// The format name is not in the registry.
    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    /// The composed target path is a directory.
    #[error("target path is a directory: {}", .0.display())]
    PathIsDirectory(PathBuf),

    /// `write_file` was called before any shape was added.
    #[error("no shape to write to {}", .0.display())]
    NothingToWrite(PathBuf),

    /// A bounded read did not finish in time.
    #[error("reading {} did not finish within {timeout:?}", path.display())]
    ReadTimeout {
        /// File being read.
        path: PathBuf,
        /// Read budget.
        timeout: Duration,
    },

    /// Hard failure inside the kernel codec.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ExchangeError {
    /// Create an invalid option error.
    pub fn invalid_option(option: &str, value: &str, allowed: &[&str]) -> Self {
        Self::InvalidOption {
            option: option.to_string(),
            value: value.to_string(),
            allowed: allowed.join(", "),
        }
    }
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

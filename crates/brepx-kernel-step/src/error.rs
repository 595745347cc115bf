//! Error types for STEP file operations.

use brepx_kernel_topo::{ShapeKind, TopoError};
use thiserror::Error;

/// Errors that can occur while reading or writing STEP files.
#[derive(Error, Debug)]
pub enum StepError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Lexer error: unexpected character or malformed token.
    #[error("Lexer error at line {line}, column {col}: {message}")]
    Lexer {
        /// Line number (1-indexed).
        line: usize,
        /// Column number (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Parser error: unexpected token or malformed structure.
    #[error("Parser error at line {line}{}: {message}", entity_id.map(|id| format!(", entity #{id}")).unwrap_or_default())]
    Parser {
        /// Line of the offending token (0 at end of input).
        line: usize,
        /// Entity being parsed, if known.
        entity_id: Option<u64>,
        /// Error message.
        message: String,
    },

    /// Missing entity reference.
    #[error("Missing entity reference: #{0}")]
    MissingEntity(u64),

    /// Entity type the reader cannot translate.
    #[error("Unsupported entity type: {0}")]
    UnsupportedEntity(String),

    /// An argument has the wrong type or is absent.
    #[error("Entity #{entity_id}: {message}")]
    BadArgument {
        /// Entity carrying the argument.
        entity_id: u64,
        /// What was wrong.
        message: String,
    },

    /// Type mismatch (e.g. expected CARTESIAN_POINT but got DIRECTION).
    #[error("Type mismatch at #{entity_id}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Referenced entity.
        entity_id: u64,
        /// Expected type name.
        expected: String,
        /// Actual type name.
        actual: String,
    },

    /// Null shape handed to the writer.
    #[error("cannot transfer a null shape")]
    NullShape,

    /// Shape kind with no representation under the requested transfer mode.
    #[error("cannot transfer {0} shape in this transfer mode")]
    UnsupportedShape(ShapeKind),

    /// Solid with inner shells; only single-shell solids are written.
    #[error("solids with voids are not supported by the STEP writer")]
    SolidWithVoids,

    /// Shape structure the writer cannot encode.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Schema name that is not one of the supported protocols.
    #[error("unknown STEP schema '{0}'")]
    UnknownSchema(String),

    /// Colour component outside `[0, 1]`.
    #[error("colour component {0} is outside [0, 1]")]
    InvalidColor(f64),

    /// Write requested before anything was transferred.
    #[error("nothing has been transferred to the STEP model")]
    EmptyModel,

    /// Rebuilding topology from the file failed.
    #[error("topology error: {0}")]
    Topo(#[from] TopoError),
}

impl StepError {
    /// Create a lexer error.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(line: usize, entity_id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Parser {
            line,
            entity_id,
            message: message.into(),
        }
    }

    /// Create a bad-argument error.
    pub fn bad_argument(entity_id: u64, message: impl Into<String>) -> Self {
        Self::BadArgument {
            entity_id,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(entity_id: u64, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            entity_id,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result alias for STEP operations.
pub type Result<T> = std::result::Result<T, StepError>;

//! Error types for the kernel codecs.

use brepx_kernel_iges::IgesError;
use brepx_kernel_step::StepError;
use brepx_kernel_topo::TopoError;
use thiserror::Error;

/// Errors raised by the native BREP text codec.
#[derive(Error, Debug)]
pub enum BrepError {
    /// The first line is not the format banner.
    #[error("not a BREPX topology file")]
    BadHeader,

    /// A line could not be decoded.
    #[error("BREP parse error at line {line}: {message}")]
    Parse {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },

    /// A null shape has no BREP representation.
    #[error("cannot write a null shape")]
    NullShape,
}

impl BrepError {
    /// Create a parse error.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Errors raised by the STL codec.
#[derive(Error, Debug)]
pub enum StlError {
    /// The data is neither binary STL nor ASCII STL.
    #[error("unrecognized STL data ({0} bytes)")]
    Unrecognized(usize),

    /// ASCII STL content is malformed.
    #[error("STL parse error at token {token}: {message}")]
    Parse {
        /// Index of the offending whitespace-separated token.
        token: usize,
        /// Error message.
        message: String,
    },

    /// The shape produced no triangles to write.
    #[error("shape has no faces to triangulate")]
    EmptyMesh,
}

/// Unified error of the kernel facade.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Native BREP codec failure.
    #[error(transparent)]
    Brep(#[from] BrepError),

    /// STL codec failure.
    #[error(transparent)]
    Stl(#[from] StlError),

    /// STEP codec failure.
    #[error(transparent)]
    Step(#[from] StepError),

    /// IGES codec failure.
    #[error(transparent)]
    Iges(#[from] IgesError),

    /// Topology construction failure.
    #[error(transparent)]
    Topo(#[from] TopoError),

    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for kernel facade operations.
pub type Result<T> = std::result::Result<T, KernelError>;

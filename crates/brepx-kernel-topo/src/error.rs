//! Error types for topology construction and tessellation.

use thiserror::Error;

use crate::ShapeKind;

/// Errors raised while building or meshing shapes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopoError {
    /// A child of the wrong kind was given to a builder.
    #[error("a {parent} cannot contain a {child}")]
    InvalidChild {
        /// Kind of the node being built.
        parent: ShapeKind,
        /// Kind of the rejected child.
        child: ShapeKind,
    },

    /// A null shape was given as a child.
    #[error("null shape given as a child of a {0}")]
    NullChild(ShapeKind),

    /// A node that requires children was built without any.
    #[error("a {0} needs at least one child")]
    Empty(ShapeKind),

    /// Primitive dimensions are not strictly positive and finite.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// Two edge end points coincide.
    #[error("edge end points coincide")]
    DegenerateEdge,

    /// A face could not be triangulated.
    #[error("tessellation failed: {0}")]
    Tessellation(String),
}

#![warn(missing_docs)]

//! Topology layer of the brepx reference kernel.
//!
//! A [`Shape`] is a cheap, shareable handle to a topological node
//! (compound, solid, shell, face, wire, edge or vertex). Handles may be
//! null; clones share the underlying node, so sub-shape identity survives
//! copies and is what [`Explorer`] uses to count unique entities.
//!
//! # Example
//!
//! ```
//! use brepx_kernel_topo::{make_box, TopologyExplorer};
//!
//! let solid = make_box(10.0, 20.0, 30.0).unwrap();
//! let topo = TopologyExplorer::new(&solid);
//! assert_eq!(topo.number_of_faces(), 6);
//! assert_eq!(topo.number_of_edges(), 12);
//! ```

mod error;
mod explore;
mod primitives;
mod shape;
mod tessellate;

pub use error::TopoError;
pub use explore::{Explorer, TopologyExplorer};
pub use primitives::{make_box, make_sphere, make_sphere_at, EdgeMaker};
pub use shape::{AsShape, Curve, NodeId, Orientation, Shape, ShapeKind, Surface};
pub use tessellate::{tessellate, TessellationParams, TriangleMesh};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = nalgebra::Vector3<f64>;

#![warn(missing_docs)]

//! Reference B-rep kernel facade for brepx.
//!
//! Re-exports the topology, STEP and IGES crates and adds the two codecs
//! that need no document model: the native BREP text format ([`brep`]) and
//! STL meshes ([`stl`]). Every codec error converts into [`KernelError`].
//!
//! # Example
//!
//! ```
//! use brepx_kernel::stl::{StlReader, StlWriter};
//! use brepx_kernel::{make_box, TopologyExplorer};
//!
//! let data = StlWriter::new().to_bytes(&make_box(10.0, 20.0, 30.0).unwrap()).unwrap();
//! let mesh = StlReader::read_bytes(&data).unwrap();
//! assert_eq!(TopologyExplorer::new(&mesh).number_of_faces(), 12);
//! ```

pub use brepx_kernel_iges;
pub use brepx_kernel_step;
pub use brepx_kernel_topo;

pub mod brep;
mod error;
pub mod stl;

pub use error::{BrepError, KernelError, Result, StlError};

pub use brepx_kernel_iges::{IgesReader, IgesVersion, IgesWriter};
pub use brepx_kernel_step::{Color, ShapeStyle, StepReader, StepSchema, StepWriter, TransferMode};
pub use brepx_kernel_topo::{
    make_box, make_sphere, make_sphere_at, AsShape, EdgeMaker, Point3, Shape, ShapeKind,
    TopologyExplorer, Vec3,
};

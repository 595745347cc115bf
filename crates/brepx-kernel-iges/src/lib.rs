//! IGES 5.x exchange for the brepx kernel.
//!
//! [`IgesFile`] is the fixed-column record model (start, global, directory
//! and parameter sections). [`IgesWriter`] maps kernel shapes onto it and
//! [`IgesReader`] maps independent B-rep, curve and point entities back.
//!
//! The [`IgesVersion`] selects the write mode. Version 5.1 writes every face
//! as an independent trimmed face with its own vertex and edge lists, so
//! solid structure is lost. Version 5.3 writes manifold solids (type 186)
//! that share one vertex list and one edge list per transferred shape.
//! Wires, edges and vertices are written as independent composite curves,
//! curves and points in both versions.
//!
//! # Example
//!
//! ```
//! use brepx_kernel_iges::{IgesReader, IgesVersion, IgesWriter};
//! use brepx_kernel_topo::{make_box, TopologyExplorer};
//!
//! let mut writer = IgesWriter::new(IgesVersion::V5_3);
//! writer.add_shape(&make_box(10.0, 20.0, 30.0).unwrap()).unwrap();
//! let text = writer.to_iges_string("box.igs").unwrap();
//!
//! let mut reader = IgesReader::new();
//! reader.read_buffer(text.as_bytes()).unwrap();
//! assert_eq!(reader.transfer_roots(), 1);
//! assert_eq!(TopologyExplorer::new(&reader.one_shape()).number_of_solids(), 1);
//! ```

#![warn(missing_docs)]

mod error;
mod reader;
mod record;
mod writer;

pub use error::{IgesError, Result};
pub use reader::IgesReader;
pub use record::{de_pointer, Entity, IgesFile, Param};
pub use writer::{IgesVersion, IgesWriter};

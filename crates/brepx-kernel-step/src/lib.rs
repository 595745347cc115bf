//! STEP (ISO 10303-21) exchange for the brepx kernel.
//!
//! [`StepReader`] turns the B-rep roots of an exchange file back into
//! kernel shapes; [`StepWriter`] accumulates shapes into one entity model
//! and serializes it under the AP203 or AP214 schema.
//!
//! Supported geometry: planes, spheres, lines and circles. Solids map to
//! `MANIFOLD_SOLID_BREP`; shells and faces to `SHELL_BASED_SURFACE_MODEL`;
//! wires, edges and vertices to `GEOMETRIC_CURVE_SET`. Under AP214 a
//! transfer may carry a [`ShapeStyle`], written as a root colour and layer.
//!
//! # Example
//!
//! ```
//! use brepx_kernel_step::{StepReader, StepSchema, StepWriter, TransferMode};
//! use brepx_kernel_topo::{make_box, TopologyExplorer};
//!
//! let mut writer = StepWriter::new(StepSchema::Ap214Cd);
//! writer.transfer(&make_box(10.0, 20.0, 30.0).unwrap(), TransferMode::AsIs).unwrap();
//! let text = writer.to_step_string("box.step").unwrap();
//!
//! let mut reader = StepReader::new();
//! reader.read_buffer(text.as_bytes()).unwrap();
//! assert_eq!(reader.transfer_roots(), 1);
//! assert_eq!(TopologyExplorer::new(&reader.one_shape()).number_of_faces(), 6);
//! ```

#![warn(missing_docs)]

mod entities;
mod error;
mod lexer;
mod parser;
mod reader;
mod style;
mod writer;

pub use entities::EntityArgs;
pub use error::{Result, StepError};
pub use parser::{StepEntity, StepFile, StepValue};
pub use reader::StepReader;
pub use style::{Color, ShapeStyle};
pub use writer::{StepSchema, StepWriter, TransferMode};

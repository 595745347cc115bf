#![warn(missing_docs)]

//! Validated import and export of B-rep shapes.
//!
//! An [`Exporter`] is bound to one target file and format at construction;
//! shapes are added one by one and written with [`Exporter::write_file`].
//! An [`Importer`] validates and reads its source file eagerly. Both share
//! the [`Format`] registry of accepted extensions and option values, and
//! the checks in [`checks`].
//!
//! Logging goes through `tracing`; no subscriber is installed here.
//!
//! # Example
//!
//! ```
//! use brepx::kernel::{make_box, TopologyExplorer};
//! use brepx::{ExportOptions, Exporter, Format, Importer};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("box.step");
//!
//! let mut exporter = Exporter::with_options(Format::Step, &path, &ExportOptions::new())?;
//! exporter.add_shape(&make_box(10.0, 20.0, 30.0).unwrap())?;
//! exporter.write_file()?;
//!
//! let importer = Importer::new(Format::Step, &path)?;
//! assert_eq!(TopologyExplorer::new(importer.compound()).number_of_faces(), 6);
//! # Ok::<(), brepx::ExchangeError>(())
//! ```

pub use brepx_kernel as kernel;

pub mod checks;
mod config;
mod dispatch;
mod error;
mod exporter;
mod format;
mod importer;
mod options;

pub use config::{ExchangeConfig, ExportConfig, ImportConfig};
pub use dispatch::{extract_file_extension, path_from_file, read_shape_from_file, write_shape_to_file};
pub use error::{ExchangeError, Result};
pub use exporter::Exporter;
pub use format::{Format, FormatSpec, OptionSpec, FORMATS, IGES_VERSION, STEP_SCHEMA};
pub use importer::Importer;
pub use options::{ExportOptions, ImportOptions};

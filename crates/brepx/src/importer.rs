//! Import sessions: validate a source path and read it eagerly.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use brepx_kernel::brep::read_brep;
use brepx_kernel::stl::StlReader;
use brepx_kernel::{IgesReader, KernelError, Shape, ShapeKind, ShapeStyle, StepReader};
use tracing::Span;

use crate::checks::{file_extension, validate_import_path};
use crate::error::{ExchangeError, Result};
use crate::format::Format;
use crate::options::ImportOptions;

/// Outcome of one kernel read.
struct ReadOutcome {
    shape: Shape,
    transferred: Option<usize>,
    styles: Vec<ShapeStyle>,
}

/// A file read into kernel shapes.
///
/// Construction validates the path and performs the read; a constructed
/// importer always holds a non-null shape.
///
/// ```no_run
/// use brepx::{Format, Importer};
///
/// let importer = Importer::new(Format::Step, "models/box.step")?;
/// println!("{} roots", importer.transferred_roots().unwrap_or(0));
/// # Ok::<(), brepx::ExchangeError>(())
/// ```
#[derive(Debug)]
pub struct Importer {
    format: Format,
    path: PathBuf,
    shape: Shape,
    transferred: Option<usize>,
    styles: Vec<ShapeStyle>,
    span: Span,
}

impl Importer {
    /// Read `path` as `format` with default options.
    pub fn new(format: Format, path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(format, path, &ImportOptions::default())
    }

    /// Read `path`, inferring the format from its extension.
    pub fn for_path(path: impl AsRef<Path>, options: &ImportOptions) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| ExchangeError::FormatMismatch {
            path: path.to_path_buf(),
            extension: file_extension(path),
            expected: Format::all_extensions().join(", "),
        })?;
        Self::with_options(format, path, options)
    }

    /// Read `path` as `format`.
    pub fn with_options(format: Format, path: impl AsRef<Path>, options: &ImportOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let span = tracing::info_span!(
            parent: &options.parent(),
            "importer",
            format = %format,
            path = %path.display()
        );
        let outcome = span.in_scope(|| -> Result<ReadOutcome> {
            validate_import_path(&path, format.extensions())?;
            tracing::info!("reading file");
            let outcome = match options.timeout() {
                Some(timeout) => read_bounded(format, &path, timeout)?,
                None => read(format, &path)?,
            };
            if outcome.shape.is_null() {
                return Err(ExchangeError::Integrity {
                    path: path.clone(),
                    reason: "the shape is null".into(),
                });
            }
            tracing::info!(
                kind = ?outcome.shape.kind(),
                transferred = outcome.transferred,
                "read file"
            );
            Ok(outcome)
        })?;

        Ok(Self {
            format,
            path,
            shape: outcome.shape,
            transferred: outcome.transferred,
            styles: outcome.styles,
            span,
        })
    }

    /// Bound format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shape that was read.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The aggregated result of an IGES or STEP read: a compound when the
    /// file held several roots, the single root otherwise.
    pub fn compound(&self) -> &Shape {
        &self.shape
    }

    /// Top-level shapes: the members of a compound, or the shape itself.
    pub fn shapes(&self) -> Vec<Shape> {
        if self.shape.kind() == Some(ShapeKind::Compound) {
            self.shape.children().to_vec()
        } else {
            vec![self.shape.clone()]
        }
    }

    /// Roots transferred by an IGES or STEP read; `None` for other formats.
    pub fn transferred_roots(&self) -> Option<usize> {
        self.transferred
    }

    /// Colour and layer per transferred root, aligned with
    /// [`shapes`](Self::shapes).
    ///
    /// Only STEP files carry styles; for other formats this is empty.
    pub fn styles(&self) -> &[ShapeStyle] {
        &self.styles
    }

    /// Session span.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

fn read(format: Format, path: &Path) -> Result<ReadOutcome> {
    match format {
        Format::Brep => Ok(ReadOutcome {
            shape: read_brep(path)?,
            transferred: None,
            styles: Vec::new(),
        }),
        Format::Stl => Ok(ReadOutcome {
            shape: StlReader::read(path)?,
            transferred: None,
            styles: Vec::new(),
        }),
        Format::Iges => {
            let mut reader = IgesReader::new();
            reader.read_file(path).map_err(KernelError::from)?;
            let total = reader.nb_roots_for_transfer();
            let transferred = reader.transfer_roots();
            tracing::debug!(total, transferred, "transferred IGES roots");
            Ok(ReadOutcome {
                shape: reader.one_shape(),
                transferred: Some(transferred),
                styles: Vec::new(),
            })
        }
        Format::Step => {
            let mut reader = StepReader::new();
            reader.read_file(path).map_err(KernelError::from)?;
            let total = reader.nb_roots_for_transfer();
            let transferred = reader.transfer_roots();
            tracing::debug!(total, transferred, "transferred STEP roots");
            Ok(ReadOutcome {
                shape: reader.one_shape(),
                transferred: Some(transferred),
                styles: reader.styles().to_vec(),
            })
        }
    }
}

/// Run the read on a worker thread and stop waiting after `timeout`.
fn read_bounded(format: Format, path: &Path, timeout: Duration) -> Result<ReadOutcome> {
    let worker_path = path.to_path_buf();
    bounded(path, timeout, move || read(format, &worker_path))
}

/// Run `job` on a worker thread, waiting at most `timeout` for its result.
///
/// A worker that overruns is left to finish in the background; its result
/// is discarded. A worker that stops without sending (a panic) is an
/// integrity failure for `path`.
fn bounded<T, F>(path: &Path, timeout: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let span = Span::current();
    std::thread::spawn(move || {
        let _entered = span.enter();
        let _ = tx.send(job());
    });

    match rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(?timeout, "read timed out, worker left running");
            Err(ExchangeError::ReadTimeout {
                path: path.to_path_buf(),
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(ExchangeError::Integrity {
            path: path.to_path_buf(),
            reason: "reader stopped without a result".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brepx_kernel::brep::write_brep;
    use brepx_kernel::stl::StlWriter;
    use brepx_kernel::{make_box, make_sphere, TopologyExplorer};

    #[test]
    fn test_wrong_extension_before_existence() {
        let err = Importer::new(Format::Stl, "/nonexistent/stupid-filename.bad_extension").unwrap_err();
        assert!(matches!(err, ExchangeError::FormatMismatch { .. }));
        let err = Importer::new(Format::Stl, "/nonexistent/box.stl").unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound(_)));
    }

    #[test]
    fn test_step_file_rejected_by_stl_importer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aube_pleine.stp");
        std::fs::write(&path, "ISO-10303-21;").unwrap();
        assert!(matches!(
            Importer::new(Format::Stl, &path),
            Err(ExchangeError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_brep_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.brep");
        write_brep(&make_box(10.0, 20.0, 30.0).unwrap(), &path).unwrap();

        let importer = Importer::new(Format::Brep, &path).unwrap();
        assert_eq!(importer.format(), Format::Brep);
        assert_eq!(importer.transferred_roots(), None);
        assert_eq!(importer.shapes().len(), 1);
        let topo = TopologyExplorer::new(importer.shape());
        assert_eq!(topo.number_of_faces(), 6);
        assert_eq!(topo.number_of_edges(), 12);
    }

    #[test]
    fn test_null_brep_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.brep");
        std::fs::write(&path, "BREPX Topology V1\nShapes 0\nRoot -\n").unwrap();
        assert!(matches!(
            Importer::new(Format::Brep, &path),
            Err(ExchangeError::Integrity { .. })
        ));
    }

    #[test]
    fn test_corrupt_content_is_kernel_error() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["empty.stl", "empty.step", "empty.igs", "empty.brep"] {
            let path = dir.path().join(name);
            std::fs::write(&path, "").unwrap();
            let err = Importer::for_path(&path, &ImportOptions::new()).unwrap_err();
            assert!(matches!(err, ExchangeError::Kernel(_)), "{name}: {err:?}");
        }
    }

    #[test]
    fn test_empty_stl_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.stl");
        std::fs::write(&path, "solid empty\nendsolid empty\n").unwrap();
        assert!(matches!(
            Importer::new(Format::Stl, &path),
            Err(ExchangeError::Integrity { .. })
        ));
    }

    #[test]
    fn test_for_path_unknown_extension() {
        let err = Importer::for_path("/tmp/model.obj", &ImportOptions::new()).unwrap_err();
        match err {
            ExchangeError::FormatMismatch { extension, expected, .. } => {
                assert_eq!(extension, "obj");
                assert_eq!(expected, "brep, iges, igs, step, stp, stl");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bounded_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphere.stl");
        StlWriter::new().write(&make_sphere(1.0).unwrap(), &path).unwrap();

        let options = ImportOptions::new().read_timeout(Duration::from_secs(30));
        let importer = Importer::for_path(&path, &options).unwrap();
        assert_eq!(importer.shape().kind(), Some(ShapeKind::Shell));

        let options = ImportOptions::new().read_timeout(Duration::ZERO);
        match Importer::for_path(&path, &options) {
            Err(ExchangeError::ReadTimeout { timeout, .. }) => assert_eq!(timeout, Duration::ZERO),
            // The worker may win the race against a zero budget.
            Ok(importer) => assert!(!importer.shape().is_null()),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_slow_reader_times_out() {
        let path = Path::new("slow.step");
        let timeout = Duration::from_millis(20);
        let result = bounded(path, timeout, || {
            std::thread::sleep(Duration::from_secs(2));
            Ok(1)
        });
        match result {
            Err(ExchangeError::ReadTimeout { path: failed, timeout: waited }) => {
                assert_eq!(failed, path);
                assert_eq!(waited, timeout);
            }
            other => panic!("expected a timeout, got {other:?}"),
        }

        let quick = bounded(path, Duration::from_secs(30), || Ok(7)).unwrap();
        assert_eq!(quick, 7);
    }

    #[test]
    fn test_panicking_reader_is_integrity_error() {
        let result: Result<()> = bounded(Path::new("bad.igs"), Duration::from_secs(30), || {
            panic!("reader failed")
        });
        assert!(matches!(result, Err(ExchangeError::Integrity { .. })));
    }
}

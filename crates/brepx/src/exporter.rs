//! Export sessions: accumulate shapes and write them to one target file.

use std::path::{Path, PathBuf};

use brepx_kernel::brep::write_brep;
use brepx_kernel::stl::StlWriter;
use brepx_kernel::{AsShape, Color, IgesWriter, KernelError, Shape, ShapeStyle, StepWriter, TransferMode};
use tracing::Span;

use crate::checks::{confirm_overwrite, file_extension, validate_export_path, validate_shape};
use crate::error::{ExchangeError, Result};
use crate::format::Format;
use crate::options::ExportOptions;

/// Kernel writer bound to a session.
///
/// BREP and STL have no multi-shape model, so they keep the latest shape.
/// IGES and STEP writers hold every transferred shape.
#[derive(Debug)]
enum WriterState {
    Brep(Option<Shape>),
    Iges(IgesWriter),
    Step(StepWriter),
    Stl(Option<Shape>),
}

/// Shapes bound for one file.
///
/// ```no_run
/// use brepx::{ExportOptions, Exporter, Format};
/// use brepx::kernel::make_box;
///
/// let options = ExportOptions::new().step_schema("AP203");
/// let mut exporter = Exporter::with_options(Format::Step, "out/box.step", &options)?;
/// exporter.add_shape(&make_box(10.0, 20.0, 30.0).unwrap())?;
/// exporter.write_file()?;
/// # Ok::<(), brepx::ExchangeError>(())
/// ```
#[derive(Debug)]
pub struct Exporter {
    format: Format,
    path: PathBuf,
    shapes: Vec<Shape>,
    state: WriterState,
    style: ShapeStyle,
    written: bool,
    span: Span,
}

impl Exporter {
    /// Export to `path` as `format` with default options.
    pub fn new(format: Format, path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(format, path, &ExportOptions::default())
    }

    /// Export to `path`, inferring the format from its extension.
    pub fn for_path(path: impl AsRef<Path>, options: &ExportOptions) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| ExchangeError::FormatMismatch {
            path: path.to_path_buf(),
            extension: file_extension(path),
            expected: Format::all_extensions().join(", "),
        })?;
        Self::with_options(format, path, options)
    }

    /// Export to `path` as `format`.
    ///
    /// The target may already exist; it is replaced on the first write.
    pub fn with_options(format: Format, path: impl AsRef<Path>, options: &ExportOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let span = tracing::info_span!(
            parent: &options.parent(),
            "exporter",
            format = %format,
            path = %path.display()
        );
        let state = span.in_scope(|| -> Result<WriterState> {
            validate_export_path(&path, format.extensions())?;
            confirm_overwrite(&path);
            let state = match format {
                Format::Brep => WriterState::Brep(None),
                Format::Stl => WriterState::Stl(None),
                Format::Iges => WriterState::Iges(IgesWriter::new(options.resolved_iges_version()?)),
                Format::Step => WriterState::Step(StepWriter::new(options.resolved_step_schema()?)),
            };
            tracing::info!("exporter created");
            Ok(state)
        })?;

        Ok(Self {
            format,
            path,
            shapes: Vec::new(),
            state,
            style: ShapeStyle::default(),
            written: false,
            span,
        })
    }

    /// Bound format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shapes that the next write will serialize, in insertion order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// `true` once a write succeeded.
    pub fn written(&self) -> bool {
        self.written
    }

    /// Session span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Colour for shapes added from now on.
    ///
    /// Only STEP carries colours; other formats ignore it.
    pub fn set_color(&mut self, color: Color) {
        self.style.color = Some(color);
        if self.format != Format::Step {
            tracing::debug!(parent: &self.span, format = %self.format, "format carries no colours");
        }
    }

    /// Layer for shapes added from now on.
    ///
    /// Only STEP carries layers; other formats ignore it.
    pub fn set_layer(&mut self, layer: impl Into<String>) {
        self.style.layer = Some(layer.into());
        if self.format != Format::Step {
            tracing::debug!(parent: &self.span, format = %self.format, "format carries no layers");
        }
    }

    /// Current colour and layer.
    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    /// Register a shape for export.
    ///
    /// IGES and STEP transfer the shape into their model immediately, so
    /// later writes include it. BREP and STL keep only the latest shape.
    /// On error the session is left unchanged.
    pub fn add_shape<C: AsShape + ?Sized>(&mut self, candidate: &C) -> Result<()> {
        let _entered = self.span.enter();
        let shape = validate_shape(candidate)?.clone();
        match &mut self.state {
            WriterState::Brep(slot) | WriterState::Stl(slot) => {
                if slot.is_some() {
                    tracing::warn!("format holds a single shape, replacing the previous one");
                }
                *slot = Some(shape.clone());
                self.shapes.clear();
            }
            WriterState::Iges(writer) => writer.add_shape(&shape).map_err(KernelError::from)?,
            WriterState::Step(writer) => {
                writer
                    .transfer_styled(&shape, TransferMode::AsIs, &self.style)
                    .map_err(KernelError::from)?;
            }
        }
        tracing::debug!(kind = ?shape.kind(), "shape added");
        self.shapes.push(shape);
        Ok(())
    }

    /// Serialize every registered shape to the target, replacing its content.
    ///
    /// May be called repeatedly; each call writes the current set.
    pub fn write_file(&mut self) -> Result<()> {
        let _entered = self.span.enter();
        tracing::info!(shapes = self.shapes.len(), "writing file");
        match &self.state {
            WriterState::Brep(Some(shape)) => write_brep(shape, &self.path)?,
            WriterState::Stl(Some(shape)) => StlWriter::new().write(shape, &self.path)?,
            WriterState::Iges(writer) if writer.nb_roots() > 0 => {
                writer.write(&self.path).map_err(KernelError::from)?
            }
            WriterState::Step(writer) if writer.nb_roots() > 0 => {
                writer.write(&self.path).map_err(KernelError::from)?
            }
            _ => return Err(ExchangeError::NothingToWrite(self.path.clone())),
        }
        self.written = true;
        tracing::info!("wrote file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brepx_kernel::{make_box, make_sphere, EdgeMaker, Point3};

    #[test]
    fn test_invalid_options_fail_construction() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions::new().step_schema("AP242").iges_version("4.0");
        let path = dir.path().join("box.step");
        assert!(matches!(
            Exporter::with_options(Format::Step, &path, &options),
            Err(ExchangeError::InvalidOption { .. })
        ));
        assert!(matches!(
            Exporter::with_options(Format::Iges, dir.path().join("box.igs"), &options),
            Err(ExchangeError::InvalidOption { .. })
        ));
        // Options of other formats are ignored.
        Exporter::with_options(Format::Brep, dir.path().join("box.brep"), &options).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("box.stl");
        assert!(matches!(
            Exporter::new(Format::Stl, &path),
            Err(ExchangeError::DirectoryNotFound(_))
        ));
        assert!(matches!(
            Exporter::new(Format::Stl, dir.path().join("box.step")),
            Err(ExchangeError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_write_without_shape() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.brep", "a.igs", "a.stp", "a.stl"] {
            let path = dir.path().join(name);
            let mut exporter = Exporter::for_path(&path, &ExportOptions::new()).unwrap();
            assert!(matches!(exporter.write_file(), Err(ExchangeError::NothingToWrite(_))));
            assert!(!exporter.written());
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_invalid_shapes_leave_session_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(Format::Step, dir.path().join("box.step")).unwrap();
        exporter.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();

        assert!(matches!(
            exporter.add_shape(&Point3::new(1.0, 2.0, 3.0)),
            Err(ExchangeError::InvalidShape(_))
        ));
        assert!(exporter.add_shape(&Shape::null()).is_err());
        let maker = EdgeMaker::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(matches!(exporter.add_shape(&maker), Err(ExchangeError::InvalidShape(_))));
        assert_eq!(exporter.shapes().len(), 1);
    }

    #[test]
    fn test_edges_and_vertices_export() {
        let dir = tempfile::tempdir().unwrap();
        let edge = EdgeMaker::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap().shape();
        let vertex = brepx_kernel::Shape::vertex(Point3::new(0.0, 0.0, 5.0));
        for name in ["e.step", "e.igs", "e.iges", "e.brep"] {
            let path = dir.path().join(name);
            let mut exporter = Exporter::for_path(&path, &ExportOptions::new()).unwrap();
            exporter.add_shape(&edge).unwrap();
            exporter.write_file().unwrap();
            let importer = crate::Importer::for_path(&path, &Default::default()).unwrap();
            assert_eq!(importer.shape().kind(), edge.kind(), "{name}");

            if name != "e.brep" {
                exporter.add_shape(&vertex).unwrap();
                exporter.write_file().unwrap();
                let importer = crate::Importer::for_path(&path, &Default::default()).unwrap();
                assert_eq!(importer.transferred_roots(), Some(2), "{name}");
            }
        }
    }

    #[test]
    fn test_style_applies_to_later_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styled.step");
        let red = Color::new(1.0, 0.0, 0.0).unwrap();
        let mut exporter = Exporter::new(Format::Step, &path).unwrap();
        exporter.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        exporter.set_color(red);
        exporter.set_layer("red");
        exporter.add_shape(&make_sphere(1.0).unwrap()).unwrap();
        assert_eq!(exporter.style(), &ShapeStyle::new().with_color(red).with_layer("red"));
        exporter.write_file().unwrap();

        let importer = crate::Importer::new(Format::Step, &path).unwrap();
        assert_eq!(importer.styles(), [ShapeStyle::new(), ShapeStyle::new().with_color(red).with_layer("red")]);

        // Formats without styles accept and ignore them.
        let mut exporter = Exporter::new(Format::Iges, dir.path().join("plain.igs")).unwrap();
        exporter.set_color(red);
        exporter.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        exporter.write_file().unwrap();
        let importer = crate::Importer::new(Format::Iges, dir.path().join("plain.igs")).unwrap();
        assert!(importer.styles().is_empty());
    }

    #[test]
    fn test_single_shape_formats_replace() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(Format::Brep, dir.path().join("a.brep")).unwrap();
        exporter.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        let sphere = make_sphere(1.0).unwrap();
        exporter.add_shape(&sphere).unwrap();
        assert_eq!(exporter.shapes().len(), 1);
        assert!(exporter.shapes()[0].is_same(&sphere));
    }

    #[test]
    fn test_write_sets_flag_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.iges");
        std::fs::write(&path, "old content").unwrap();
        let mut exporter = Exporter::new(Format::Iges, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old content");
        exporter.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        exporter.write_file().unwrap();
        assert!(exporter.written());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("old content"));
        assert!(text.lines().all(|l| l.len() == 80));
    }
}

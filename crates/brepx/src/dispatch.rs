//! One-shot helpers routing through the format registry.

use std::path::{Component, Path, PathBuf};

use brepx_kernel::Shape;

use crate::error::{ExchangeError, Result};
use crate::exporter::Exporter;
use crate::format::Format;
use crate::importer::Importer;
use crate::options::ImportOptions;

/// Write `shape` to `directory/basename.format` and return that path.
///
/// `format` is an extension known to the registry (`iges`, `igs`, `step`,
/// `stp`, `brep` or `stl`) and is used verbatim as the file extension.
pub fn write_shape_to_file(
    shape: &Shape,
    directory: impl AsRef<Path>,
    basename: &str,
    format: &str,
) -> Result<PathBuf> {
    let directory = directory.as_ref();
    let stem = directory.join(basename);
    if stem.is_dir() {
        return Err(ExchangeError::PathIsDirectory(stem));
    }
    let target = Format::from_extension(format).ok_or_else(|| ExchangeError::UnknownFormat(format.to_string()))?;

    let path = directory.join(format!("{basename}.{format}"));
    let mut exporter = Exporter::new(target, &path)?;
    exporter.add_shape(shape)?;
    exporter.write_file()?;
    Ok(path)
}

/// Read the shape stored at `path`, inferring the format from its extension.
pub fn read_shape_from_file(path: impl AsRef<Path>) -> Result<Shape> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ExchangeError::NotFound(path.to_path_buf()));
    }
    let importer = Importer::for_path(path, &ImportOptions::default())?;
    Ok(importer.shape().clone())
}

/// Absolute path of `relative` resolved against the directory of `origin`.
///
/// `origin` is canonicalized when it exists; `.` and `..` in the result are
/// removed lexically.
pub fn path_from_file(origin: impl AsRef<Path>, relative: impl AsRef<Path>) -> PathBuf {
    let origin = origin.as_ref();
    let origin = std::fs::canonicalize(origin)
        .or_else(|_| std::path::absolute(origin))
        .unwrap_or_else(|_| origin.to_path_buf());
    let base = origin.parent().unwrap_or(origin.as_path());

    let mut out = PathBuf::new();
    for component in base.join(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Text after the last `.` of the final `/`-separated segment of `name`.
///
/// A name without a dot is returned whole.
pub fn extract_file_extension(name: &str) -> &str {
    let file = name.rsplit('/').next().unwrap_or(name);
    file.rsplit('.').next().unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brepx_kernel::{make_box, TopologyExplorer};

    #[test]
    fn test_write_and_read_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let solid = make_box(10.0, 20.0, 30.0).unwrap();
        for (format, faces) in [("brep", 6), ("igs", 6), ("iges", 6), ("step", 6), ("stp", 6), ("stl", 12)] {
            let path = write_shape_to_file(&solid, dir.path(), "box", format).unwrap();
            assert_eq!(path, dir.path().join(format!("box.{format}")));
            let shape = read_shape_from_file(&path).unwrap();
            assert_eq!(TopologyExplorer::new(&shape).number_of_faces(), faces, "{format}");
        }
    }

    #[test]
    fn test_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let solid = make_box(1.0, 1.0, 1.0).unwrap();
        assert!(matches!(
            write_shape_to_file(&solid, dir.path(), "box", "obj"),
            Err(ExchangeError::UnknownFormat(f)) if f == "obj"
        ));
    }

    #[test]
    fn test_target_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("box")).unwrap();
        let solid = make_box(1.0, 1.0, 1.0).unwrap();
        assert!(matches!(
            write_shape_to_file(&solid, dir.path(), "box", "step"),
            Err(ExchangeError::PathIsDirectory(_))
        ));
    }

    #[test]
    fn test_read_missing_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_shape_from_file(dir.path().join("missing.step")),
            Err(ExchangeError::NotFound(_))
        ));
        let path = dir.path().join("model.obj");
        std::fs::write(&path, "o cube").unwrap();
        assert!(matches!(read_shape_from_file(&path), Err(ExchangeError::FormatMismatch { .. })));
    }

    #[test]
    fn test_path_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("tests").join("test_step.rs");
        std::fs::create_dir(dir.path().join("tests")).unwrap();
        std::fs::write(&origin, "").unwrap();
        let resolved = path_from_file(&origin, "./models_in/../models_out/box.stp");
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(resolved, root.join("tests").join("models_out").join("box.stp"));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_extract_file_extension() {
        assert_eq!(extract_file_extension("models/box.part.STEP"), "STEP");
        assert_eq!(extract_file_extension("/tmp/archive.d/box"), "box");
        assert_eq!(extract_file_extension("box.igs"), "igs");
    }
}

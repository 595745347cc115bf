//! Path and shape validation.

use std::path::{Path, PathBuf};

use brepx_kernel::{AsShape, Shape};

use crate::error::{ExchangeError, Result};

/// Lower-cased extension of `path`, empty when it has none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn check_extension(path: &Path, allowed: &[&str]) -> Result<()> {
    let extension = file_extension(path);
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        Ok(())
    } else {
        Err(ExchangeError::FormatMismatch {
            path: path.to_path_buf(),
            extension,
            expected: allowed.join(", "),
        })
    }
}

/// Check that `path` can be imported by a format accepting `allowed`.
///
/// The extension is checked before the file system is touched, so a wrong
/// extension is reported even for a missing file.
pub fn validate_import_path(path: &Path, allowed: &[&str]) -> Result<()> {
    check_extension(path, allowed)?;
    if !path.is_file() {
        return Err(ExchangeError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Check that `path` can be written by a format accepting `allowed`.
///
/// The target itself may already exist.
pub fn validate_export_path(path: &Path, allowed: &[&str]) -> Result<()> {
    check_extension(path, allowed)?;
    let parent = parent_dir(path);
    if !parent.is_dir() {
        return Err(ExchangeError::DirectoryNotFound(parent));
    }
    Ok(())
}

/// Directory holding `path`; a bare file name lives in the current directory.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `true` when something already exists at `path`.
pub fn confirm_overwrite(path: &Path) -> bool {
    let exists = path.exists();
    if exists {
        tracing::warn!(path = %path.display(), "existing file will be overwritten");
    }
    exists
}

/// Accept any non-null shape; reject null shapes and non-shape values.
pub fn validate_shape<C: AsShape + ?Sized>(candidate: &C) -> Result<&Shape> {
    let shape = candidate
        .as_shape()
        .ok_or_else(|| ExchangeError::InvalidShape("value is not a shape".into()))?;
    if shape.is_null() {
        return Err(ExchangeError::InvalidShape("shape is null".into()));
    }
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brepx_kernel::{make_box, EdgeMaker, Point3, TopologyExplorer};

    #[test]
    fn test_import_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_import_path(&dir.path().join("dummy.igs"), &["iges", "igs"]).unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound(_)));
    }

    #[test]
    fn test_import_extension_checked_first() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_import_path(&dir.path().join("dummy.igs"), &["step"]).unwrap_err();
        match err {
            ExchangeError::FormatMismatch { extension, expected, .. } => {
                assert_eq!(extension, "igs");
                assert_eq!(expected, "step");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_import_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BOX.IGS");
        std::fs::write(&path, "").unwrap();
        validate_import_path(&path, &["iges", "igs"]).unwrap();
        // A directory is not an importable file.
        let folder = dir.path().join("folder.igs");
        std::fs::create_dir(&folder).unwrap();
        assert!(matches!(
            validate_import_path(&folder, &["igs"]),
            Err(ExchangeError::NotFound(_))
        ));
    }

    #[test]
    fn test_export_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("inexistent-dir").join("dummy.igs");
        assert!(matches!(
            validate_export_path(&missing, &["igs"]),
            Err(ExchangeError::DirectoryNotFound(p)) if p == dir.path().join("inexistent-dir")
        ));
        assert!(matches!(
            validate_export_path(&dir.path().join("box.igs"), &["step"]),
            Err(ExchangeError::FormatMismatch { .. })
        ));
        validate_export_path(&dir.path().join("box.igs"), &["iges", "igs"]).unwrap();
        validate_export_path(Path::new("relative.stl"), &["stl"]).unwrap();
        assert!(!missing.exists());
    }

    #[test]
    fn test_confirm_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("box.igs");
        std::fs::write(&existing, "data").unwrap();
        assert!(confirm_overwrite(&existing));
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "data");

        let absent = dir.path().join("bo_.igs");
        assert!(!confirm_overwrite(&absent));
        assert!(!absent.exists());
    }

    #[test]
    fn test_validate_shape() {
        assert!(matches!(validate_shape(&Shape::null()), Err(ExchangeError::InvalidShape(_))));
        assert!(validate_shape(&Point3::origin()).is_err());

        let maker = EdgeMaker::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0)).unwrap();
        assert!(validate_shape(&maker).is_err());

        let edge = maker.shape();
        assert!(validate_shape(&edge).is_ok());
        let sub = TopologyExplorer::new(&edge).vertices().next().unwrap();
        assert!(validate_shape(&sub).is_ok());
        assert!(validate_shape(&make_box(1.0, 1.0, 1.0).unwrap()).is_ok());
    }
}

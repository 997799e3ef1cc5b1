//! Crash-safe file replacement.

use crate::error::{KegError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a sibling temp file and a rename.
///
/// The parent directory is created if needed. On failure the temp file is
/// removed (dropping a [`NamedTempFile`] deletes it) and whatever was at
/// `path` before is left as it was. The directory itself is not fsynced.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let context = |what: &str| format!("{} {}", what, path.display());

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| KegError::io(context("creating the directory for"), e))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| KegError::io(context("creating a temp file for"), e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| KegError::io(context("writing"), e))?;
    temp.persist(path)
        .map_err(|e| KegError::io(context("replacing"), e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_creates_parent_and_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/config.yaml");
        write_atomic(&path, b"kegs: {}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kegs: {}\n");
        assert_eq!(entries(&temp.path().join("a/b")), vec!["config.yaml"]);
    }

    #[test]
    fn test_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "old\n").unwrap();
        write_atomic(&path, b"new\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(entries(temp.path()), vec!["config.yaml"]);
    }

    #[test]
    fn test_failed_replace_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let path = temp.path().join("config.yaml");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = write_atomic(&path, b"new\n").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::IoError);
        assert_eq!(entries(temp.path()), vec!["config.yaml"]);
        assert_eq!(std::fs::read_to_string(path.join("keep")).unwrap(), "x");
    }
}

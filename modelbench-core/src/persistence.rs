//! Shared file-system helpers: folder creation and atomic writes for report artifacts.

use std::io;
use std::path::Path;

/// Create `path` (and parents) if it does not exist yet.
///
/// Logs when a folder is actually created. Failing to create an output folder is
/// always an error for the caller.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to create folder");
    })?;
    tracing::info!(path = %path.display(), "Created folder");
    Ok(())
}

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling file, then renames to the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_creates_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("modellname").join("sub");
        assert!(!nested.exists());
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_dir_fails_below_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_dir(&file.join("child")).is_err());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("report.html");
        atomic_write(&path, b"<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
        assert!(!path.with_extension("tmp").exists());
    }
}

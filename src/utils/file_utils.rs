//! File system utilities

use anyhow::{anyhow, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", path.display(), e))?;
    }
    Ok(())
}

/// Sanitize filename for filesystem
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Per-request local video path that is removed on every exit path.
///
/// Call [`TempVideoFile::remove`] to observe the outcome; otherwise the file
/// is removed when the guard is dropped.
#[derive(Debug)]
pub struct TempVideoFile {
    path: PathBuf,
    released: bool,
}

impl TempVideoFile {
    /// Reserve `<dir>/video-<request_id>.mp4`; nothing is created on disk
    pub fn for_request(dir: &Path, request_id: &str) -> Self {
        let name = format!("video-{}.mp4", sanitize_filename(request_id));
        Self {
            path: dir.join(name),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file; returns whether a file was actually removed
    pub async fn remove(mut self) -> io::Result<bool> {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TempVideoFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed {} on drop", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c?.mp4"), "a_b_c_.mp4");
        assert_eq!(sanitize_filename("plain-name"), "plain-name");
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir_exists(&nested).unwrap();
    }

    #[test]
    fn test_paths_are_unique_per_request() {
        let dir = tempdir().unwrap();
        let a = TempVideoFile::for_request(dir.path(), "one");
        let b = TempVideoFile::for_request(dir.path(), "two");
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_remove_reports_whether_file_existed() {
        let dir = tempdir().unwrap();
        let guard = TempVideoFile::for_request(dir.path(), "req");
        std::fs::write(guard.path(), b"data").unwrap();
        let path = guard.path().to_path_buf();

        assert!(guard.remove().await.unwrap());
        assert!(!path.exists());

        let missing = TempVideoFile::for_request(dir.path(), "never-written");
        assert!(!missing.remove().await.unwrap());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempdir().unwrap();
        let path = {
            let guard = TempVideoFile::for_request(dir.path(), "dropped");
            std::fs::write(guard.path(), b"data").unwrap();
            guard.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}

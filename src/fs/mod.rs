// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod mock;

/// File operations used around the results-file lifecycle.
///
/// Errors stay as `io::Error` so callers can tell transient lock failures
/// (`PermissionDenied`) from a file that is already gone (`NotFound`).
pub trait FileSystem: Send + Sync + Debug {
    /// Create a new, uniquely named, empty file that outlives this call.
    fn create_temp_file(&self, suffix: &str) -> io::Result<PathBuf>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Implementation backed by `std::fs` and `tempfile`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn create_temp_file(&self, suffix: &str) -> io::Result<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix("tailexec-")
            .suffix(suffix)
            .tempfile()?;
        let path = file.into_temp_path().keep().map_err(|e| e.error)?;
        Ok(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

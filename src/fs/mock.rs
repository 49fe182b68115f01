// src/fs/mock.rs

use super::FileSystem;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    files: HashSet<PathBuf>,
    next_id: usize,
    fail_create: Option<io::ErrorKind>,
    /// Remaining removals that fail, and with which error.
    failing_removals: usize,
    removal_error: Option<io::ErrorKind>,
    remove_attempts: usize,
}

/// In-memory file system with scriptable failures.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(path.as_ref().to_path_buf());
    }

    /// Make every `create_temp_file` call fail with `kind`.
    pub fn fail_create(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().fail_create = Some(kind);
    }

    /// Make the next `times` removals fail with `kind` before succeeding.
    pub fn fail_removals(&self, times: usize, kind: io::ErrorKind) {
        let mut state = self.state.lock().unwrap();
        state.failing_removals = times;
        state.removal_error = Some(kind);
    }

    pub fn remove_attempts(&self) -> usize {
        self.state.lock().unwrap().remove_attempts
    }
}

impl FileSystem for MockFileSystem {
    fn create_temp_file(&self, suffix: &str) -> io::Result<PathBuf> {
        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.fail_create {
            return Err(io::Error::new(kind, "mock create failure"));
        }
        state.next_id += 1;
        let path = PathBuf::from(format!("/mock/tmp/tailexec-{}{}", state.next_id, suffix));
        state.files.insert(path.clone());
        Ok(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.remove_attempts += 1;
        if state.failing_removals > 0 {
            state.failing_removals -= 1;
            let kind = state.removal_error.unwrap_or(io::ErrorKind::PermissionDenied);
            return Err(io::Error::new(kind, "mock removal failure"));
        }
        if state.files.remove(path) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such mock file"))
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().files.contains(path)
    }
}

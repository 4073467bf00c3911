//! Shared helpers for integration tests

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A scratch directory of `.scr` files.
pub struct Scripts {
    dir: TempDir,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Write `name.scr` and return its path.
    pub fn write(
        &self,
        name: &str,
        source: &str,
    ) -> PathBuf {
        let path = self.dir.path().join(format!("{}.scr", name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create script dir");
        }
        fs::write(&path, source).expect("write script");
        path
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

//! PID marker file, present while the daemon runs.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    written: bool,
}

impl PidFile {
    /// `pid.txt` next to the executable.
    pub fn default_path() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        Some(exe.parent()?.join("pid.txt"))
    }

    /// Write the current PID to `path`. A failed write is logged and the
    /// file is then left alone on removal.
    pub fn create(path: PathBuf) -> Self {
        let written = match fs::write(&path, std::process::id().to_string()) {
            Ok(()) => {
                log::debug!("pid file {}", path.display());
                true
            }
            Err(e) => {
                log::warn!("failed to write pid file {}: {e}", path.display());
                false
            }
        };
        Self { path, written }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    pub fn remove(self) {
        if !self.written {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove pid file {}: {e}", self.path.display());
        }
    }
}

//! Signal file: an alternative to `kill -USR1` for callers that can only
//! write files.
//!
//! The file holds a signal number. `10` requests the full OSD, `12` the
//! compact one. Once read, the file is armed and not polled again until the
//! requested OSD times out, at which point `0` is written back.

use std::fs;
use std::path::{Path, PathBuf};

use crate::event::OverlayTarget;

const SIGUSR1: i32 = 10;
const SIGUSR2: i32 = 12;

#[derive(Debug)]
pub struct SignalFile {
    path: PathBuf,
    armed: Option<OverlayTarget>,
}

impl SignalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn armed(&self) -> Option<OverlayTarget> {
        self.armed
    }

    /// Read the file unless it is armed or an OSD is already showing.
    pub fn poll(&mut self, osd_active: bool) -> Option<OverlayTarget> {
        if self.armed.is_some() || osd_active {
            return None;
        }
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                log::trace!("signal file {}: {e}", self.path.display());
                return None;
            }
        };
        let target = match text.trim().parse::<i32>() {
            Ok(SIGUSR1) => OverlayTarget::Full,
            Ok(SIGUSR2) => OverlayTarget::Tiny,
            _ => return None,
        };
        log::debug!("signal file requests {target}");
        self.armed = Some(target);
        Some(target)
    }

    /// Called when `target` timed out. Writes `0` and disarms if the file
    /// armed that OSD.
    pub fn on_timeout(&mut self, target: OverlayTarget) {
        if self.armed == Some(target) {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.armed = None;
        if let Err(e) = fs::write(&self.path, "0") {
            log::warn!("failed to reset signal file {}: {e}", self.path.display());
        }
    }
}

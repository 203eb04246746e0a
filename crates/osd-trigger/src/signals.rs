//! Process signal handling.
//!
//! Handlers only store into atomics (async-signal-safe). The scheduler drains
//! the OSD requests once per tick and polls the shutdown flag.

use std::sync::atomic::{AtomicBool, Ordering};

use osd_types::error::{OsdError, Result};

use crate::event::OverlayTarget;

static FULL_REQUESTED: AtomicBool = AtomicBool::new(false);
static TINY_REQUESTED: AtomicBool = AtomicBool::new(false);
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_usr1(_: libc::c_int) {
    FULL_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_usr2(_: libc::c_int) {
    TINY_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_shutdown(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

fn install_one(signal: libc::c_int, handler: extern "C" fn(libc::c_int), name: &str) -> Result<()> {
    // SAFETY: the handlers only perform atomic stores.
    unsafe {
        let handler = handler as *const () as libc::sighandler_t;
        if libc::signal(signal, handler) == libc::SIG_ERR {
            return Err(OsdError::Io(std::io::Error::other(format!(
                "failed to install {name} handler"
            ))));
        }
    }
    Ok(())
}

/// Install handlers for SIGUSR1/SIGUSR2 (OSD requests) and
/// SIGINT/SIGTERM/SIGABRT (shutdown).
pub fn install() -> Result<()> {
    install_one(libc::SIGUSR1, handle_usr1, "SIGUSR1")?;
    install_one(libc::SIGUSR2, handle_usr2, "SIGUSR2")?;
    install_one(libc::SIGINT, handle_shutdown, "SIGINT")?;
    install_one(libc::SIGTERM, handle_shutdown, "SIGTERM")?;
    install_one(libc::SIGABRT, handle_shutdown, "SIGABRT")?;
    Ok(())
}

/// Pending OSD requests, clearing them. Full before compact.
pub fn take_requests() -> impl Iterator<Item = OverlayTarget> {
    let full = FULL_REQUESTED.swap(false, Ordering::SeqCst);
    let tiny = TINY_REQUESTED.swap(false, Ordering::SeqCst);
    [
        full.then_some(OverlayTarget::Full),
        tiny.then_some(OverlayTarget::Tiny),
    ]
    .into_iter()
    .flatten()
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test: the flags are process-wide.
    #[test]
    fn raised_signals_reach_the_flags() {
        install().unwrap();
        assert_eq!(take_requests().count(), 0);

        // SAFETY: handlers are installed, raise() delivers synchronously.
        unsafe {
            libc::raise(libc::SIGUSR2);
            libc::raise(libc::SIGUSR1);
        }
        let got: Vec<_> = take_requests().collect();
        assert_eq!(got, vec![OverlayTarget::Full, OverlayTarget::Tiny]);
        assert_eq!(take_requests().count(), 0);

        assert!(!shutdown_requested());
        handle_shutdown(libc::SIGTERM);
        assert!(shutdown_requested());
        SHUTDOWN.store(false, Ordering::SeqCst);
    }
}

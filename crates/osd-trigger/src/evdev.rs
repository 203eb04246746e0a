//! Key-sequence detector thread reading a Linux input device.
//!
//! The device is either a fixed event file or found by scanning a folder for
//! a device whose `EVIOCGNAME` matches the configured name. The descriptor is
//! non-blocking and polled at the scheduler rate. When the device disappears
//! (`ENODEV`, `ENOENT`, `EBADF`) it is closed and reopened after the retry
//! interval.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use osd_types::config::EvdevConfig;
use osd_types::error::{OsdError, Result};

use crate::event::{TriggerEvent, TriggerSource};
use crate::sequence::{KeyPress, SequenceDetector, parse_sequence};

const EVENT_LEN: usize = std::mem::size_of::<libc::input_event>();
const TIME_LEN: usize = std::mem::size_of::<libc::timeval>();
/// Events drained per `read` call.
const READ_BATCH: usize = 64;
const NAME_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Raw event decoding
// ---------------------------------------------------------------------------

/// Decode `struct input_event` records, keeping code and value.
/// A trailing partial record is ignored.
pub fn decode_events(bytes: &[u8], out: &mut Vec<KeyPress>) {
    for rec in bytes.chunks_exact(EVENT_LEN) {
        let code = u16::from_ne_bytes([rec[TIME_LEN + 2], rec[TIME_LEN + 3]]);
        let value = i32::from_ne_bytes([
            rec[TIME_LEN + 4],
            rec[TIME_LEN + 5],
            rec[TIME_LEN + 6],
            rec[TIME_LEN + 7],
        ]);
        out.push(KeyPress { code, value });
    }
}

/// Read every pending event from a non-blocking reader.
///
/// Stops at `WouldBlock` or end of data. Other errors are returned.
pub fn drain<R: Read>(reader: &mut R, out: &mut Vec<KeyPress>) -> io::Result<()> {
    let mut buf = [0u8; EVENT_LEN * READ_BATCH];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                decode_events(&buf[..n], out);
                if n < buf.len() {
                    return Ok(());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Whether a read error means the device went away.
fn is_device_lost(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENODEV) | Some(libc::ENOENT) | Some(libc::EBADF)
    )
}

// ---------------------------------------------------------------------------
// Device discovery
// ---------------------------------------------------------------------------

/// `EVIOCGNAME(len)`: `_IOC(_IOC_READ, 'E', 0x06, len)`.
fn eviocgname(len: usize) -> libc::c_ulong {
    const IOC_READ: libc::c_ulong = 2;
    (IOC_READ << 30) | ((len as libc::c_ulong) << 16) | ((b'E' as libc::c_ulong) << 8) | 0x06
}

fn open_nonblocking(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

/// Kernel-reported device name of an open input device.
pub fn device_name(file: &File) -> Result<String> {
    let mut buf = [0u8; NAME_LEN];
    // SAFETY: the buffer outlives the call and its length is encoded in the request.
    let rc = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            eviocgname(buf.len()) as _,
            buf.as_mut_ptr(),
        )
    };
    if rc < 0 {
        return Err(OsdError::DeviceUnavailable(format!(
            "EVIOCGNAME: {}",
            io::Error::last_os_error()
        )));
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// `eventN` entries of an input folder, in name order.
fn event_nodes(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut nodes: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .collect();
    nodes.sort();
    Ok(nodes)
}

/// Log every input device in `dir` with its name.
pub fn list_devices(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut found = Vec::new();
    for node in event_nodes(dir)? {
        let name = open_nonblocking(&node)
            .map_err(OsdError::from)
            .and_then(|f| device_name(&f))
            .unwrap_or_default();
        log::info!("input device {}: \"{name}\"", node.display());
        found.push((node, name));
    }
    Ok(found)
}

/// Find the device named `name` in `dir`.
pub fn find_device(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    for node in event_nodes(dir)? {
        let Ok(file) = open_nonblocking(&node) else {
            continue;
        };
        if device_name(&file).is_ok_and(|n| n == name) {
            return Ok((node, file));
        }
    }
    Err(OsdError::DeviceUnavailable(format!(
        "no input device named \"{name}\" in {}",
        dir.display()
    )))
}

/// Where events come from, with the name learned from a fixed file so the
/// device can be found again if it is renumbered.
#[derive(Debug)]
struct InputDevice {
    path: PathBuf,
    name: String,
    file: Option<File>,
    retry_at: Option<Instant>,
}

impl InputDevice {
    fn new(path: PathBuf, name: String) -> Self {
        Self {
            path,
            name,
            file: None,
            retry_at: None,
        }
    }

    fn open(&mut self) -> Result<()> {
        let is_dir = fs::metadata(&self.path)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            let (node, file) = find_device(&self.path, &self.name)?;
            log::info!("input device \"{}\" found at {}", self.name, node.display());
            self.file = Some(file);
            return Ok(());
        }

        match open_nonblocking(&self.path) {
            Ok(file) => {
                if let Ok(name) = device_name(&file) {
                    if name != self.name {
                        log::debug!("learned input device name \"{name}\"");
                        self.name = name;
                    }
                }
                self.file = Some(file);
                Ok(())
            }
            Err(e) if !self.name.is_empty() => {
                let dir = self.path.parent().unwrap_or(Path::new("/dev/input"));
                log::debug!("{}: {e}, looking for \"{}\"", self.path.display(), self.name);
                let (_, file) = find_device(dir, &self.name)?;
                self.file = Some(file);
                Ok(())
            }
            Err(e) => Err(OsdError::DeviceUnavailable(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Poll once. Opens the device when due and drains pending events.
    fn poll(&mut self, now: Instant, retry: Duration, out: &mut Vec<KeyPress>) {
        if self.file.is_none() {
            if self.retry_at.is_some_and(|at| now < at) {
                return;
            }
            if let Err(e) = self.open() {
                log::warn!("{e}, retrying in {}s", retry.as_secs());
                self.retry_at = Some(now + retry);
                return;
            }
            self.retry_at = None;
        }

        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = drain(file, out) {
            if is_device_lost(&e) {
                log::warn!("input device lost ({e}), retrying in {}s", retry.as_secs());
                self.file = None;
                self.retry_at = Some(now + retry);
            } else {
                log::debug!("input read failed: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Detector thread
// ---------------------------------------------------------------------------

/// Start the detector thread.
///
/// Returns `Ok(None)` when detection is off: disabled in the config, no
/// sequence configured, or scan mode (a folder with no device name, which
/// only lists the available devices).
pub fn spawn(
    config: &EvdevConfig,
    detect_interval: Duration,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    events: SyncSender<TriggerEvent>,
) -> Result<Option<JoinHandle<()>>> {
    if !config.enabled {
        return Ok(None);
    }
    let osd = parse_sequence(&config.osd_sequence)?;
    let tiny = parse_sequence(&config.tiny_osd_sequence)?;
    let detector = SequenceDetector::new(osd, tiny, detect_interval);
    if !detector.has_sequences() {
        log::info!("no key sequence configured, key detection disabled");
        return Ok(None);
    }

    let is_dir = fs::metadata(&config.path).is_ok_and(|m| m.is_dir());
    if is_dir && config.device_name.is_empty() {
        log::info!("scan mode, available input devices:");
        list_devices(&config.path)?;
        return Ok(None);
    }

    let device = InputDevice::new(config.path.clone(), config.device_name.clone());
    let retry = Duration::from_secs(config.retry_interval_secs);
    let handle = thread::Builder::new()
        .name("osd-keys".into())
        .spawn(move || run(device, detector, retry, poll_interval, &stop, &events))?;
    Ok(Some(handle))
}

fn run(
    mut device: InputDevice,
    mut detector: SequenceDetector,
    retry: Duration,
    poll_interval: Duration,
    stop: &AtomicBool,
    events: &SyncSender<TriggerEvent>,
) {
    let mut batch = Vec::with_capacity(READ_BATCH);
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        batch.clear();
        device.poll(now, retry, &mut batch);

        if let Some(target) = detector.process_batch(&batch, now) {
            log::debug!("key sequence for {target}");
            match events.try_send(TriggerEvent::new(TriggerSource::KeySequence, target, now)) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        thread::sleep(poll_interval);
    }
    log::debug!("key detector stopped");
}

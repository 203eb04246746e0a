//! GPIO input lines for the low battery, OSD and compact OSD triggers.
//!
//! Three backends are probed in order: the GPIO character device, the sysfs
//! interface and the `raspi-gpio` command line tool. If none initialises, GPIO
//! is disabled and every line reads `false`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use osd_types::config::GpioConfig;
use osd_types::error::{OsdError, Result};

const CONSUMER: &str = "osd-daemon";

/// An input line that can be sampled.
pub trait GpioLine {
    /// Raw line level, `true` = high.
    fn read(&mut self) -> Result<bool>;
}

/// A way of opening GPIO lines.
pub trait GpioBackend {
    fn name(&self) -> &'static str;
    fn open_line(&mut self, pin: u32) -> Result<Box<dyn GpioLine>>;
}

// ---------------------------------------------------------------------------
// Character device
// ---------------------------------------------------------------------------

pub struct CdevBackend {
    chip: Chip,
}

impl CdevBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let chip = Chip::new(path)
            .map_err(|e| OsdError::DeviceUnavailable(format!("{}: {e}", path.display())))?;
        Ok(Self { chip })
    }
}

struct CdevLine(LineHandle);

impl GpioLine for CdevLine {
    fn read(&mut self) -> Result<bool> {
        self.0
            .get_value()
            .map(|v| v != 0)
            .map_err(|e| OsdError::DeviceUnavailable(format!("gpio read: {e}")))
    }
}

impl GpioBackend for CdevBackend {
    fn name(&self) -> &'static str {
        "gpiochip"
    }

    fn open_line(&mut self, pin: u32) -> Result<Box<dyn GpioLine>> {
        let handle = self
            .chip
            .get_line(pin)
            .and_then(|line| line.request(LineRequestFlags::INPUT, 0, CONSUMER))
            .map_err(|e| OsdError::DeviceUnavailable(format!("gpio {pin}: {e}")))?;
        Ok(Box::new(CdevLine(handle)))
    }
}

// ---------------------------------------------------------------------------
// Sysfs
// ---------------------------------------------------------------------------

pub struct SysfsBackend {
    root: PathBuf,
}

impl SysfsBackend {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join("export").exists() {
            return Err(OsdError::DeviceUnavailable(format!(
                "{}: no export file",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

struct SysfsLine {
    value: PathBuf,
}

impl GpioLine for SysfsLine {
    fn read(&mut self) -> Result<bool> {
        let text = fs::read_to_string(&self.value)?;
        Ok(text.trim() == "1")
    }
}

impl GpioBackend for SysfsBackend {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn open_line(&mut self, pin: u32) -> Result<Box<dyn GpioLine>> {
        let dir = self.root.join(format!("gpio{pin}"));
        if !dir.exists() {
            match fs::write(self.root.join("export"), pin.to_string()) {
                Ok(()) => {}
                // Already exported by someone else.
                Err(e) if e.raw_os_error() == Some(libc::EBUSY) => {}
                Err(e) => {
                    return Err(OsdError::DeviceUnavailable(format!("export gpio {pin}: {e}")));
                }
            }
        }
        if let Err(e) = fs::write(dir.join("direction"), "in") {
            log::debug!("gpio {pin} direction: {e}");
        }
        let value = dir.join("value");
        if !value.exists() {
            return Err(OsdError::DeviceUnavailable(format!("{}", value.display())));
        }
        Ok(Box::new(SysfsLine { value }))
    }
}

// ---------------------------------------------------------------------------
// raspi-gpio
// ---------------------------------------------------------------------------

pub struct CliBackend {
    tool: PathBuf,
}

impl CliBackend {
    pub fn open(tool: &Path) -> Result<Self> {
        fs::metadata(tool)
            .map_err(|e| OsdError::DeviceUnavailable(format!("{}: {e}", tool.display())))?;
        Ok(Self {
            tool: tool.to_path_buf(),
        })
    }
}

/// Level from `raspi-gpio get N` output, e.g.
/// `GPIO 10: level=1 fsel=0 func=INPUT pull=DOWN`.
pub fn parse_raspi_gpio(output: &str, pin: u32) -> Option<bool> {
    let prefix = format!("GPIO {pin}:");
    let line = output.lines().find(|l| l.trim_start().starts_with(&prefix))?;
    let level = line.split_whitespace().find_map(|w| w.strip_prefix("level="))?;
    match level {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

struct CliLine {
    tool: PathBuf,
    pin: u32,
}

impl GpioLine for CliLine {
    fn read(&mut self) -> Result<bool> {
        let out = Command::new(&self.tool)
            .arg("get")
            .arg(self.pin.to_string())
            .output()?;
        let text = String::from_utf8_lossy(&out.stdout);
        parse_raspi_gpio(&text, self.pin).ok_or_else(|| {
            OsdError::InvalidFormat(format!("{}: '{}'", self.tool.display(), text.trim()))
        })
    }
}

impl GpioBackend for CliBackend {
    fn name(&self) -> &'static str {
        "raspi-gpio"
    }

    fn open_line(&mut self, pin: u32) -> Result<Box<dyn GpioLine>> {
        let mut line = CliLine {
            tool: self.tool.clone(),
            pin,
        };
        line.read()?;
        Ok(Box::new(line))
    }
}

fn open_cdev(config: &GpioConfig) -> Result<Box<dyn GpioBackend>> {
    Ok(Box::new(CdevBackend::open(&config.chip)?))
}

fn open_sysfs(config: &GpioConfig) -> Result<Box<dyn GpioBackend>> {
    Ok(Box::new(SysfsBackend::open(&config.sysfs_root)?))
}

fn open_cli(config: &GpioConfig) -> Result<Box<dyn GpioBackend>> {
    Ok(Box::new(CliBackend::open(&config.cli_tool)?))
}

/// First backend that initialises, or `None` with GPIO disabled.
pub fn probe(config: &GpioConfig) -> Option<Box<dyn GpioBackend>> {
    type Opener = fn(&GpioConfig) -> Result<Box<dyn GpioBackend>>;
    let attempts: [(&str, Opener); 3] = [
        ("gpiochip", open_cdev),
        ("sysfs", open_sysfs),
        ("raspi-gpio", open_cli),
    ];
    for (name, attempt) in attempts {
        match attempt(config) {
            Ok(backend) => {
                log::info!("gpio backend: {name}");
                return Some(backend);
            }
            Err(e) => log::debug!("gpio backend {name} unavailable: {e}"),
        }
    }
    log::warn!("no gpio backend available, gpio triggers disabled");
    None
}

// ---------------------------------------------------------------------------
// Trigger lines
// ---------------------------------------------------------------------------

/// One configured trigger pin.
struct TriggerPin {
    pin: u32,
    line: Box<dyn GpioLine>,
    reversed: bool,
}

impl TriggerPin {
    fn open(backend: &mut dyn GpioBackend, pin: i32, reversed: bool, what: &str) -> Option<Self> {
        let pin = u32::try_from(pin).ok()?;
        match backend.open_line(pin) {
            Ok(line) => {
                log::info!("{what} gpio {pin} via {}", backend.name());
                Some(Self {
                    pin,
                    line,
                    reversed,
                })
            }
            Err(e) => {
                log::warn!("{what} gpio {pin} unavailable: {e}");
                None
            }
        }
    }

    fn is_active(&mut self) -> bool {
        match self.line.read() {
            Ok(level) => level != self.reversed,
            Err(e) => {
                log::debug!("gpio {} read failed: {e}", self.pin);
                false
            }
        }
    }
}

/// The low battery, OSD and compact OSD lines. Missing lines read `false`.
#[derive(Default)]
pub struct GpioTriggers {
    lowbat: Option<TriggerPin>,
    osd: Option<TriggerPin>,
    tiny: Option<TriggerPin>,
}

impl GpioTriggers {
    /// Open the configured pins on `backend`. With no backend every line is
    /// off.
    pub fn open(backend: Option<&mut dyn GpioBackend>, config: &GpioConfig) -> Self {
        let Some(backend) = backend else {
            return Self::disabled();
        };
        Self {
            lowbat: TriggerPin::open(backend, config.lowbat_pin, config.lowbat_reversed, "low battery"),
            osd: TriggerPin::open(backend, config.osd_pin, config.osd_reversed, "osd"),
            tiny: TriggerPin::open(backend, config.tiny_osd_pin, config.tiny_osd_reversed, "tiny osd"),
        }
    }

    /// Probe the backends and open the configured pins.
    pub fn from_config(config: &GpioConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let mut backend = probe(config);
        Self::open(backend.as_deref_mut().map(|b| b as &mut dyn GpioBackend), config)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn has_lowbat(&self) -> bool {
        self.lowbat.is_some()
    }

    pub fn has_osd_lines(&self) -> bool {
        self.osd.is_some() || self.tiny.is_some()
    }

    pub fn lowbat(&mut self) -> bool {
        self.lowbat.as_mut().is_some_and(TriggerPin::is_active)
    }

    pub fn osd(&mut self) -> bool {
        self.osd.as_mut().is_some_and(TriggerPin::is_active)
    }

    pub fn tiny(&mut self) -> bool {
        self.tiny.as_mut().is_some_and(TriggerPin::is_active)
    }
}

//! Process-wide configuration.
//!
//! Built once at startup from a TOML (or JSON) file layered over the built-in
//! defaults, validated, then passed by reference to every component. Out of
//! range values never abort startup: [`OsdConfig::validate`] clamps them back
//! into range and logs each correction.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::color::Palette;
use crate::error::{OsdError, Result};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OsdConfig {
    pub display: DisplayConfig,
    pub style: StyleConfig,
    pub osd: FullOsdConfig,
    pub tiny_osd: TinyOsdConfig,
    pub icons: IconConfig,
    pub battery: BatteryConfig,
    pub cpu: CpuConfig,
    pub data: DataConfig,
    pub evdev: EvdevConfig,
    pub gpio: GpioConfig,
    /// File polled for a `SIGUSR1`/`SIGUSR2` value when signals can't be sent.
    pub signal_file: Option<PathBuf>,
    /// PID marker. `None` writes `pid.txt` next to the executable.
    pub pid_file: Option<PathBuf>,
    pub debug: DebugConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Which compositor backend presents the overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Linux framebuffer device `/dev/fb{number}`.
    Fbdev,
    /// In-memory composition only (optionally exported as PNG).
    Headless,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display number (0-255), i.e. the framebuffer index.
    pub number: u32,
    /// Base compositor layer. Full OSD +1, icons +2, compact OSD +3.
    pub layer: i32,
    /// Main loop rate in Hz (1-120).
    pub check_rate: u32,
    pub backend: BackendKind,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            number: 0,
            layer: 10000,
            check_rate: 30,
            backend: BackendKind::Fbdev,
        }
    }
}

/// Shared styling of the full and compact OSD.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Hide an OSD this many seconds after activation (1-20).
    pub timeout_secs: u32,
    pub bg_color: String,
    pub text_color: String,
    pub warn_color: String,
    pub crit_color: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            bg_color: "00000050".to_string(),
            text_color: "FFFFFF".to_string(),
            warn_color: "ffa038".to_string(),
            crit_color: "ff5548".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FullOsdConfig {
    pub enabled: bool,
    /// Line capacity of the screen, drives the internal resolution (1-999).
    pub max_lines: u32,
    /// Text distance in pixels to the buffer border (0-100).
    pub text_padding: u32,
}

impl Default for FullOsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_lines: 16,
            text_padding: 5,
        }
    }
}

/// Vertical placement of the compact OSD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TinyOsdPosition {
    #[serde(rename = "top", alias = "t")]
    Top,
    #[serde(rename = "bottom", alias = "b")]
    Bottom,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TinyOsdConfig {
    pub enabled: bool,
    /// Height as percent of the display height (1-100).
    pub height_percent: u32,
    pub position: TinyOsdPosition,
}

impl Default for TinyOsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            height_percent: 5,
            position: TinyOsdPosition::Top,
        }
    }
}

/// Display corner the warning icons stack from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IconCorner {
    #[serde(rename = "tl")]
    TopLeft,
    #[serde(rename = "tr")]
    TopRight,
    #[serde(rename = "bl")]
    BottomLeft,
    #[serde(rename = "br")]
    BottomRight,
}

impl IconCorner {
    pub fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }

    pub fn is_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    /// Show the low battery icon.
    pub battery: bool,
    /// Show the CPU temperature warning icon.
    pub cpu: bool,
    pub position: IconCorner,
    /// Icon height as percent of the display height (1-100).
    pub height_percent: u32,
    /// Distance to the display borders in pixels.
    pub padding: u32,
    pub low_battery_image: PathBuf,
    pub cpu_temp_image: PathBuf,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            battery: true,
            cpu: true,
            position: IconCorner::TopRight,
            height_percent: 9,
            padding: 10,
            low_battery_image: PathBuf::from("res/low_battery.png"),
            cpu_temp_image: PathBuf::from("res/temp_warn.png"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// File containing the battery percentage.
    pub capacity_path: PathBuf,
    /// File containing the battery voltage.
    pub voltage_path: PathBuf,
    /// Raw voltage reading is divided by this to get volts.
    pub volt_divider: u32,
    /// Low battery threshold in percent (0-90).
    pub low_limit: i32,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_path: PathBuf::from("/sys/class/power_supply/battery/capacity"),
            voltage_path: PathBuf::from("/sys/class/power_supply/battery/voltage_now"),
            volt_divider: 1_000_000,
            low_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub thermal_path: PathBuf,
    pub thermal_divider: u32,
    /// Warning temperature in degrees Celsius.
    pub warn: i32,
    /// Critical temperature, also the icon threshold.
    pub crit: i32,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            thermal_path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            thermal_divider: 1000,
            warn: 70,
            crit: 80,
        }
    }
}

/// Secondary data sources shown on the OSDs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// RTC device directory. When missing the clock falls back to NTC, then uptime.
    pub rtc_path: PathBuf,
    pub backlight_path: PathBuf,
    pub backlight_max_path: PathBuf,
    /// kB to MB divider for `/proc/meminfo`.
    pub memory_divider: u32,
    pub iw_path: PathBuf,
    pub timedatectl_path: PathBuf,
    /// Program queried for GPU memory (`get_mem`).
    pub vcgencmd_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            rtc_path: PathBuf::from("/sys/class/rtc/rtc0/"),
            backlight_path: PathBuf::from("/dev/shm/uhid_i2c_driver/0/backlight"),
            backlight_max_path: PathBuf::from("/dev/shm/uhid_i2c_driver/0/backlight_max"),
            memory_divider: 1024,
            iw_path: PathBuf::from("/sbin/iw"),
            timedatectl_path: PathBuf::from("/usr/bin/timedatectl"),
            vcgencmd_path: PathBuf::from("vcgencmd"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvdevConfig {
    pub enabled: bool,
    /// Event device file, or a folder scanned for `device_name`.
    pub path: PathBuf,
    /// Device name to match when `path` is a folder. Empty lists devices.
    pub device_name: String,
    /// Retry interval in seconds after the device failed.
    pub retry_interval_secs: u64,
    /// Every key of a sequence must arrive within this window.
    pub detect_interval_ms: u64,
    /// Comma separated key codes, hex (`0x13c`) or decimal.
    pub osd_sequence: String,
    pub tiny_osd_sequence: String,
}

impl Default for EvdevConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("/dev/input/"),
            device_name: "Controller Name".to_string(),
            retry_interval_secs: 10,
            detect_interval_ms: 200,
            osd_sequence: "0x13c,0x136,0x137".to_string(),
            tiny_osd_sequence: "0x13c,0x138,0x139".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub enabled: bool,
    /// Character device probed first.
    pub chip: PathBuf,
    /// Sysfs GPIO root probed second.
    pub sysfs_root: PathBuf,
    /// External tool used as last resort (`<tool> get <pin>`).
    pub cli_tool: PathBuf,
    /// Pins are BCM numbers, `-1` disables.
    pub lowbat_pin: i32,
    pub lowbat_reversed: bool,
    pub osd_pin: i32,
    pub osd_reversed: bool,
    pub tiny_osd_pin: i32,
    pub tiny_osd_reversed: bool,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chip: PathBuf::from("/dev/gpiochip0"),
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            cli_tool: PathBuf::from("/usr/bin/raspi-gpio"),
            lowbat_pin: 10,
            lowbat_reversed: true,
            osd_pin: -1,
            osd_reversed: false,
            tiny_osd_pin: -1,
            tiny_osd_reversed: false,
        }
    }
}

/// Test and diagnostic switches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Keep the full OSD displayed until exit.
    pub osd_test: bool,
    /// Keep the compact OSD displayed until exit.
    pub tiny_osd_test: bool,
    /// Keep the low battery icon displayed until exit.
    pub lowbat_test: bool,
    /// Keep the CPU temperature icon displayed until exit.
    pub cputemp_test: bool,
    /// Export every rendered overlay buffer as PNG into this folder.
    pub export_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl OsdConfig {
    /// Load from a TOML file, or JSON when the extension is `.json`, then
    /// validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        for correction in config.validate() {
            log::warn!("{correction}");
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Clamp every ranged option into its valid range.
    ///
    /// Returns one `Config` error per corrected value.
    pub fn validate(&mut self) -> Vec<OsdError> {
        let mut fixes = Vec::new();
        clamp("style.timeout_secs", &mut self.style.timeout_secs, 1, 20, &mut fixes);
        clamp("display.check_rate", &mut self.display.check_rate, 1, 120, &mut fixes);
        clamp("display.number", &mut self.display.number, 0, 255, &mut fixes);
        clamp("osd.max_lines", &mut self.osd.max_lines, 1, 999, &mut fixes);
        clamp("osd.text_padding", &mut self.osd.text_padding, 0, 100, &mut fixes);
        clamp(
            "tiny_osd.height_percent",
            &mut self.tiny_osd.height_percent,
            1,
            100,
            &mut fixes,
        );
        clamp(
            "icons.height_percent",
            &mut self.icons.height_percent,
            1,
            100,
            &mut fixes,
        );
        clamp("battery.low_limit", &mut self.battery.low_limit, 0, 90, &mut fixes);
        clamp(
            "battery.volt_divider",
            &mut self.battery.volt_divider,
            1,
            u32::MAX,
            &mut fixes,
        );
        clamp(
            "cpu.thermal_divider",
            &mut self.cpu.thermal_divider,
            1,
            u32::MAX,
            &mut fixes,
        );
        clamp(
            "data.memory_divider",
            &mut self.data.memory_divider,
            1,
            u32::MAX,
            &mut fixes,
        );
        fixes
    }

    /// OSD hide delay.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.style.timeout_secs))
    }

    /// Duration of one scheduler tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.display.check_rate.max(1)))
    }

    /// Key sequence detection window.
    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.evdev.detect_interval_ms)
    }

    /// Resolved colors, with per-color fallback to the defaults.
    pub fn palette(&self) -> Palette {
        Palette::resolve(
            &self.style.bg_color,
            &self.style.text_color,
            &self.style.warn_color,
            &self.style.crit_color,
        )
    }
}

fn clamp<T>(name: &str, value: &mut T, min: T, max: T, fixes: &mut Vec<OsdError>)
where
    T: PartialOrd + Copy + Display,
{
    let original = *value;
    if original < min {
        *value = min;
    } else if original > max {
        *value = max;
    } else {
        return;
    }
    fixes.push(OsdError::Config(format!(
        "invalid {name} '{original}', reset to '{}', allow from '{min}' to '{max}' (incl.)",
        *value
    )));
}

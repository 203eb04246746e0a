//! [`SensorService`] backed by sysfs/procfs files and a few system tools.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use osd_types::config::OsdConfig;

use crate::clock::{ClockReading, ClockSource};
use crate::net;
use crate::procfs::{CpuLoadSampler, leading_float, leading_int, parse_meminfo, parse_vcgencmd_mem};
use crate::services::{Backlight, BatteryStatus, MemoryUsage, NetInterface, SensorService};

/// Network data needs one `iw` call per interface; refreshed at most this often.
const NETWORK_REFRESH: Duration = Duration::from_secs(2);
/// GPU memory needs four `vcgencmd` calls.
const GPU_REFRESH: Duration = Duration::from_secs(1);

/// A value refreshed at most once per period.
#[derive(Debug)]
struct Cached<T> {
    value: T,
    at: Option<Instant>,
    period: Duration,
}

impl<T: Clone> Cached<T> {
    fn new(value: T, period: Duration) -> Self {
        Self {
            value,
            at: None,
            period,
        }
    }

    fn get_or_refresh(&mut self, now: Instant, refresh: impl FnOnce() -> T) -> T {
        if self.at.is_none_or(|at| now.saturating_duration_since(at) >= self.period) {
            self.value = refresh();
            self.at = Some(now);
        }
        self.value.clone()
    }
}

pub struct SysfsSensors {
    capacity_path: PathBuf,
    voltage_path: PathBuf,
    volt_divider: f64,
    thermal_path: PathBuf,
    thermal_divider: i64,
    backlight_path: PathBuf,
    backlight_max_path: PathBuf,
    memory_divider: i64,
    iw_path: PathBuf,
    vcgencmd: PathBuf,
    proc_root: PathBuf,
    cpu_load: CpuLoadSampler,
    gpu_total: Option<i64>,
    gpu_unavailable: bool,
    gpu: Cached<Option<MemoryUsage>>,
    network: Cached<Vec<NetInterface>>,
    clock: ClockSource,
}

impl SysfsSensors {
    pub fn new(config: &OsdConfig) -> Self {
        Self::with_proc_root(config, PathBuf::from("/proc"))
    }

    /// Read `stat`, `meminfo` and `uptime` from `proc_root` instead of `/proc`.
    pub fn with_proc_root(config: &OsdConfig, proc_root: PathBuf) -> Self {
        let clock = ClockSource::new(
            config.data.rtc_path.clone(),
            config.data.timedatectl_path.clone(),
            proc_root.join("uptime"),
        );
        Self {
            capacity_path: config.battery.capacity_path.clone(),
            voltage_path: config.battery.voltage_path.clone(),
            volt_divider: f64::from(config.battery.volt_divider.max(1)),
            thermal_path: config.cpu.thermal_path.clone(),
            thermal_divider: i64::from(config.cpu.thermal_divider.max(1)),
            backlight_path: config.data.backlight_path.clone(),
            backlight_max_path: config.data.backlight_max_path.clone(),
            memory_divider: i64::from(config.data.memory_divider.max(1)),
            iw_path: config.data.iw_path.clone(),
            vcgencmd: config.data.vcgencmd_path.clone(),
            proc_root,
            cpu_load: CpuLoadSampler::default(),
            gpu_total: None,
            gpu_unavailable: false,
            gpu: Cached::new(None, GPU_REFRESH),
            network: Cached::new(Vec::new(), NETWORK_REFRESH),
            clock,
        }
    }

    fn read_int(path: &Path) -> Option<i64> {
        fs::read_to_string(path).ok().and_then(|t| leading_int(&t))
    }

    fn vcgencmd_mem(&mut self, key: &str) -> Option<i64> {
        if self.gpu_unavailable {
            return None;
        }
        match Command::new(&self.vcgencmd).args(["get_mem", key]).output() {
            Ok(out) => parse_vcgencmd_mem(&String::from_utf8_lossy(&out.stdout), key),
            Err(e) => {
                log::debug!("{}: {e}, gpu memory disabled", self.vcgencmd.display());
                self.gpu_unavailable = true;
                None
            }
        }
    }

    fn read_gpu(&mut self) -> Option<MemoryUsage> {
        if self.gpu_total.is_none() {
            let malloc_total = self.vcgencmd_mem("malloc_total").unwrap_or(0);
            let reloc_total = self.vcgencmd_mem("reloc_total").unwrap_or(0);
            if malloc_total + reloc_total > 0 {
                self.gpu_total = Some(malloc_total + reloc_total);
            }
        }
        let total = self.gpu_total?;
        let free = self.vcgencmd_mem("malloc").unwrap_or(0) + self.vcgencmd_mem("reloc").unwrap_or(0);
        Some(MemoryUsage {
            used: total - free,
            total,
        })
    }
}

impl SensorService for SysfsSensors {
    fn battery(&mut self) -> BatteryStatus {
        let soc = Self::read_int(&self.capacity_path).map(|v| v.clamp(0, 100) as i32);
        let voltage = fs::read_to_string(&self.voltage_path)
            .ok()
            .and_then(|t| leading_float(&t))
            .map(|raw| raw / self.volt_divider)
            .filter(|&v| v > 0.0);
        BatteryStatus { soc, voltage }
    }

    fn cpu_temp(&mut self) -> Option<i32> {
        Self::read_int(&self.thermal_path).map(|raw| (raw / self.thermal_divider) as i32)
    }

    fn cpu_load(&mut self) -> Option<i32> {
        let stat = fs::read_to_string(self.proc_root.join("stat")).ok()?;
        self.cpu_load.sample(&stat)
    }

    fn memory(&mut self) -> Option<MemoryUsage> {
        let text = fs::read_to_string(self.proc_root.join("meminfo")).ok()?;
        parse_meminfo(&text, self.memory_divider)
    }

    fn gpu_memory(&mut self) -> Option<MemoryUsage> {
        let now = Instant::now();
        let mut cache = std::mem::replace(&mut self.gpu, Cached::new(None, GPU_REFRESH));
        let value = cache.get_or_refresh(now, || self.read_gpu());
        self.gpu = cache;
        value
    }

    fn backlight(&mut self) -> Option<Backlight> {
        let level = Self::read_int(&self.backlight_path).filter(|&l| l >= 0)? as i32;
        let max = Self::read_int(&self.backlight_max_path)
            .filter(|&m| m >= 1)
            .map(|m| m as i32);
        Some(Backlight { level, max })
    }

    fn network(&mut self) -> Vec<NetInterface> {
        let iw = self.iw_path.clone();
        self.network
            .get_or_refresh(Instant::now(), || net::interfaces(&iw))
    }

    fn clock(&mut self) -> ClockReading {
        self.clock.read(Instant::now())
    }
}

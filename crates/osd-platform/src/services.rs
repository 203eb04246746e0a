//! Sensor service trait and the readings it returns.

use std::net::Ipv4Addr;

use crate::clock::ClockReading;

// ---------------------------------------------------------------------------
// Battery
// ---------------------------------------------------------------------------

/// Below this voltage the battery reads critical when no percentage is known.
pub const VOLTAGE_CRIT: f64 = 3.4;
/// Below this voltage the battery reads as a warning.
pub const VOLTAGE_WARN: f64 = 3.55;
/// Percentage at or below which the battery reads as a warning.
pub const SOC_WARN: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryStatus {
    /// State of charge in percent, 0-100.
    pub soc: Option<i32>,
    /// Cell voltage in volts.
    pub voltage: Option<f64>,
}

/// How alarming a reading is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Warn,
    Crit,
}

impl BatteryStatus {
    pub fn is_known(&self) -> bool {
        self.soc.is_some() || self.voltage.is_some()
    }

    /// Whether the charge is at or below `limit` percent.
    pub fn is_low(&self, limit: i32) -> bool {
        self.soc.is_some_and(|soc| soc <= limit)
    }

    /// Percentage thresholds win over voltage thresholds.
    pub fn severity(&self, low_limit: i32) -> Severity {
        match (self.soc, self.voltage) {
            (Some(soc), _) if soc > 0 => {
                if soc <= low_limit {
                    Severity::Crit
                } else if soc <= SOC_WARN {
                    Severity::Warn
                } else {
                    Severity::Normal
                }
            }
            (_, Some(v)) if v > 0.0 => {
                if v < VOLTAGE_CRIT {
                    Severity::Crit
                } else if v < VOLTAGE_WARN {
                    Severity::Warn
                } else {
                    Severity::Normal
                }
            }
            _ => Severity::Normal,
        }
    }
}

/// Severity of a CPU temperature against the configured limits.
pub fn temp_severity(temp: i32, warn: i32, crit: i32) -> Severity {
    if temp >= crit {
        Severity::Crit
    } else if temp >= warn {
        Severity::Warn
    } else {
        Severity::Normal
    }
}

// ---------------------------------------------------------------------------
// Memory, backlight, network
// ---------------------------------------------------------------------------

/// Used and total memory in MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: i64,
    pub total: i64,
}

impl MemoryUsage {
    /// Used share in percent, clamped to 0-100.
    pub fn percent(&self) -> i64 {
        if self.total <= 0 {
            return 0;
        }
        (self.used * 100 / self.total).clamp(0, 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backlight {
    pub level: i32,
    /// Absent when the max file is missing or not positive.
    pub max: Option<i32>,
}

impl Backlight {
    /// Level as percent of max, when the max is known.
    pub fn percent(&self) -> Option<f64> {
        self.max
            .filter(|&m| m >= 1)
            .map(|m| f64::from(self.level) / f64::from(m) * 100.0)
    }
}

/// Wireless link quality reported by `iw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WifiLink {
    /// Link bitrate in Mbit/s, 0 when unknown.
    pub speed: i32,
    /// Signal strength magnitude, `52` means -52 dBm. 0 when unknown.
    pub signal: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub addr: Ipv4Addr,
    pub link: Option<WifiLink>,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Everything the overlays display. Methods take `&mut self` so
/// implementations can keep sampling state and caches.
pub trait SensorService {
    fn battery(&mut self) -> BatteryStatus;

    /// CPU temperature in degrees Celsius.
    fn cpu_temp(&mut self) -> Option<i32>;

    /// CPU load in percent since the previous call.
    fn cpu_load(&mut self) -> Option<i32>;

    fn memory(&mut self) -> Option<MemoryUsage>;

    fn gpu_memory(&mut self) -> Option<MemoryUsage>;

    fn backlight(&mut self) -> Option<Backlight>;

    /// Non-loopback IPv4 interfaces.
    fn network(&mut self) -> Vec<NetInterface>;

    fn clock(&mut self) -> ClockReading;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery(soc: Option<i32>, voltage: Option<f64>) -> BatteryStatus {
        BatteryStatus { soc, voltage }
    }

    #[test]
    fn soc_thresholds() {
        assert_eq!(battery(Some(5), None).severity(10), Severity::Crit);
        assert_eq!(battery(Some(10), None).severity(10), Severity::Crit);
        assert_eq!(battery(Some(25), None).severity(10), Severity::Warn);
        assert_eq!(battery(Some(26), Some(3.0)).severity(10), Severity::Normal);
    }

    #[test]
    fn voltage_fallback_thresholds() {
        assert_eq!(battery(None, Some(3.39)).severity(10), Severity::Crit);
        assert_eq!(battery(None, Some(3.5)).severity(10), Severity::Warn);
        assert_eq!(battery(None, Some(4.1)).severity(10), Severity::Normal);
        // Zero percent is treated as unknown.
        assert_eq!(battery(Some(0), Some(3.5)).severity(10), Severity::Warn);
        assert_eq!(battery(None, None).severity(10), Severity::Normal);
    }

    #[test]
    fn low_battery_limit() {
        assert!(battery(Some(5), None).is_low(10));
        assert!(!battery(Some(50), None).is_low(10));
        assert!(!battery(None, Some(3.0)).is_low(10));
    }

    #[test]
    fn temperature_thresholds() {
        assert_eq!(temp_severity(69, 70, 80), Severity::Normal);
        assert_eq!(temp_severity(70, 70, 80), Severity::Warn);
        assert_eq!(temp_severity(80, 70, 80), Severity::Crit);
    }

    #[test]
    fn memory_percent_clamped() {
        assert_eq!(MemoryUsage { used: 50, total: 200 }.percent(), 25);
        assert_eq!(MemoryUsage { used: -5, total: 200 }.percent(), 0);
        assert_eq!(MemoryUsage { used: 300, total: 200 }.percent(), 100);
        assert_eq!(MemoryUsage { used: 1, total: 0 }.percent(), 0);
    }

    #[test]
    fn backlight_percent_needs_max() {
        let bl = Backlight {
            level: 3,
            max: Some(4),
        };
        assert_eq!(bl.percent(), Some(75.0));
        assert_eq!(Backlight { level: 3, max: None }.percent(), None);
        assert_eq!(
            Backlight {
                level: 3,
                max: Some(0)
            }
            .percent(),
            None
        );
    }
}

//! Content builders: sensor readings in, [`Frame`](crate::content::Frame) out.

pub mod full;
pub mod icons;
pub mod tiny;

use osd_platform::services::{Backlight, BatteryStatus, MemoryUsage, NetInterface, Severity, temp_severity};
use osd_platform::{ClockReading, SensorService};
use osd_types::color::{Color, Palette};
use osd_types::config::OsdConfig;

/// Snapshot of everything the overlays display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    pub battery: BatteryStatus,
    pub cpu_temp: Option<i32>,
    pub cpu_load: Option<i32>,
    pub memory: Option<MemoryUsage>,
    pub gpu: Option<MemoryUsage>,
    pub backlight: Option<Backlight>,
    pub network: Vec<NetInterface>,
    pub clock: Option<ClockReading>,
}

impl Readings {
    /// Sample every sensor except the clock.
    pub fn sample(sensors: &mut impl SensorService) -> Self {
        Self {
            battery: sensors.battery(),
            cpu_temp: sensors.cpu_temp(),
            cpu_load: sensors.cpu_load(),
            memory: sensors.memory(),
            gpu: sensors.gpu_memory(),
            backlight: sensors.backlight(),
            network: sensors.network(),
            clock: None,
        }
    }

    /// Re-read only what the warning icons depend on.
    pub fn refresh_conditions(&mut self, sensors: &mut impl SensorService) {
        self.battery = sensors.battery();
        self.cpu_temp = sensors.cpu_temp();
    }
}

/// Colors and thresholds shared by the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStyle {
    pub palette: Palette,
    /// Full OSD text padding in buffer pixels.
    pub padding: i32,
    pub low_limit: i32,
    pub temp_warn: i32,
    pub temp_crit: i32,
}

impl ContentStyle {
    pub fn from_config(config: &OsdConfig) -> Self {
        Self {
            palette: config.palette(),
            padding: config.osd.text_padding as i32,
            low_limit: config.battery.low_limit,
            temp_warn: config.cpu.warn,
            temp_crit: config.cpu.crit,
        }
    }

    /// `normal` unless the severity calls for the warn or crit color.
    pub fn severity_color(&self, severity: Severity, normal: Color) -> Color {
        match severity {
            Severity::Normal => normal,
            Severity::Warn => self.palette.warn,
            Severity::Crit => self.palette.crit,
        }
    }

    pub fn battery_color(&self, battery: &BatteryStatus, normal: Color) -> Color {
        self.severity_color(battery.severity(self.low_limit), normal)
    }

    pub fn temp_color(&self, temp: Option<i32>, normal: Color) -> Color {
        match temp {
            Some(t) => self.severity_color(temp_severity(t, self.temp_warn, self.temp_crit), normal),
            None => normal,
        }
    }
}

impl Default for ContentStyle {
    fn default() -> Self {
        Self::from_config(&OsdConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[derive(Default)]
    struct FixedSensors {
        calls: usize,
    }

    impl SensorService for FixedSensors {
        fn battery(&mut self) -> BatteryStatus {
            self.calls += 1;
            BatteryStatus {
                soc: Some(40),
                voltage: None,
            }
        }
        fn cpu_temp(&mut self) -> Option<i32> {
            Some(55)
        }
        fn cpu_load(&mut self) -> Option<i32> {
            Some(12)
        }
        fn memory(&mut self) -> Option<MemoryUsage> {
            None
        }
        fn gpu_memory(&mut self) -> Option<MemoryUsage> {
            None
        }
        fn backlight(&mut self) -> Option<Backlight> {
            None
        }
        fn network(&mut self) -> Vec<NetInterface> {
            vec![NetInterface {
                name: "wlan0".into(),
                addr: Ipv4Addr::new(10, 0, 0, 2),
                link: None,
            }]
        }
        fn clock(&mut self) -> ClockReading {
            ClockReading::Uptime(1)
        }
    }

    #[test]
    fn sample_leaves_clock_unset() {
        let mut sensors = FixedSensors::default();
        let r = Readings::sample(&mut sensors);
        assert_eq!(sensors.calls, 1);
        assert_eq!(r.battery.soc, Some(40));
        assert_eq!(r.network.len(), 1);
        assert_eq!(r.clock, None);
    }

    #[test]
    fn refresh_conditions_keeps_the_rest() {
        let mut r = Readings {
            cpu_load: Some(99),
            ..Readings::default()
        };
        let mut sensors = FixedSensors::default();
        r.refresh_conditions(&mut sensors);
        assert_eq!(sensors.calls, 1);
        assert_eq!(r.battery.soc, Some(40));
        assert_eq!(r.cpu_temp, Some(55));
        assert_eq!(r.cpu_load, Some(99));
        assert!(r.network.is_empty());
    }

    #[test]
    fn temp_colors() {
        let style = ContentStyle::default();
        let text = style.palette.text;
        assert_eq!(style.temp_color(None, text), text);
        assert_eq!(style.temp_color(Some(69), text), text);
        assert_eq!(style.temp_color(Some(70), text), style.palette.warn);
        assert_eq!(style.temp_color(Some(85), text), style.palette.crit);
    }
}

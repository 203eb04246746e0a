//! Wall clock or uptime, depending on what the device can trust.
//!
//! A device without an RTC boots with a wrong clock until NTC syncs, so the
//! time is only shown when an RTC exists or `timedatectl` reports received
//! NTC packets. Otherwise the OSD shows the uptime.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::procfs::{first_digits, parse_uptime};

/// How often `timedatectl` is asked again while NTC is not synced.
const NTC_RECHECK: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum ClockReading {
    Rtc(DateTime<Local>),
    Ntc(DateTime<Local>),
    /// Seconds since boot.
    Uptime(u64),
}

impl ClockReading {
    /// Time only: `%X` or `HH:MM:SS` of uptime.
    pub fn short(&self) -> String {
        match self {
            Self::Rtc(t) | Self::Ntc(t) => t.format("%X").to_string(),
            Self::Uptime(secs) => format_hms(*secs),
        }
    }

    /// Labelled form for the full OSD, e.g. `RTC: 12:00:00 01/31/25`.
    pub fn long(&self) -> String {
        match self {
            Self::Rtc(t) => format!("RTC: {}", t.format("%X %x")),
            Self::Ntc(t) => format!("NTC: {}", t.format("%X %x")),
            Self::Uptime(secs) => format!("Uptime: {}", format_hms(*secs)),
        }
    }
}

fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// `Packet count` of `timedatectl timesync-status` output.
pub fn parse_ntc_packets(output: &str) -> Option<i64> {
    let line = output.lines().find(|l| l.contains("Packet count"))?;
    first_digits(line)
}

#[derive(Debug)]
pub struct ClockSource {
    rtc_path: PathBuf,
    timedatectl: PathBuf,
    uptime_path: PathBuf,
    rtc: bool,
    ntc: bool,
    next_ntc_check: Option<Instant>,
}

impl ClockSource {
    pub fn new(rtc_path: PathBuf, timedatectl: PathBuf, uptime_path: PathBuf) -> Self {
        Self {
            rtc_path,
            timedatectl,
            uptime_path,
            rtc: false,
            ntc: false,
            next_ntc_check: None,
        }
    }

    /// Current reading. Once found, RTC and NTC stay selected.
    pub fn read(&mut self, now: Instant) -> ClockReading {
        if !self.rtc && self.rtc_path.exists() {
            log::debug!("clock: rtc at {}", self.rtc_path.display());
            self.rtc = true;
        }
        if !self.rtc && !self.ntc && self.next_ntc_check.is_none_or(|at| now >= at) {
            self.ntc = self.check_ntc();
            self.next_ntc_check = Some(now + NTC_RECHECK);
        }

        if self.rtc {
            ClockReading::Rtc(Local::now())
        } else if self.ntc {
            ClockReading::Ntc(Local::now())
        } else {
            let secs = std::fs::read_to_string(&self.uptime_path)
                .ok()
                .and_then(|t| parse_uptime(&t))
                .unwrap_or(0);
            ClockReading::Uptime(secs)
        }
    }

    fn check_ntc(&self) -> bool {
        if !self.timedatectl.exists() {
            return false;
        }
        let Ok(out) = Command::new(&self.timedatectl)
            .arg("timesync-status")
            .output()
        else {
            return false;
        };
        let synced = parse_ntc_packets(&String::from_utf8_lossy(&out.stdout)).is_some_and(|n| n > 0);
        if synced {
            log::debug!("clock: ntc synced");
        }
        synced
    }
}

//! Platform data sources for the OSD overlays.
//!
//! Overlay builders only see the [`SensorService`] trait. Every reading is
//! optional: a missing file or tool leaves that field out of the overlay.

pub mod clock;
pub mod net;
pub mod procfs;
pub mod services;
pub mod sysfs;

pub use clock::{ClockReading, ClockSource};
pub use services::{Backlight, BatteryStatus, MemoryUsage, NetInterface, SensorService, WifiLink};
pub use sysfs::SysfsSensors;

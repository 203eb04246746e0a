//! Trigger sources that request an OSD.
//!
//! Each source degrades on its own: a missing input device, GPIO chip or
//! signal file disables that source and leaves the rest running. Only the
//! key-sequence detector runs on its own thread; its events reach the
//! scheduler over a bounded channel.

pub mod evdev;
pub mod event;
pub mod gpio;
pub mod sequence;
pub mod signal_file;
pub mod signals;

pub use event::{OverlayTarget, TriggerEvent, TriggerSource};
pub use gpio::GpioTriggers;
pub use sequence::{SequenceDetector, parse_sequence};
pub use signal_file::SignalFile;

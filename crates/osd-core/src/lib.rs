//! Core of the handheld OSD daemon.
//!
//! Sensor readings become [`content::Frame`] display lists, overlay slots
//! turn frames into compositor elements, and the [`Scheduler`] drives both
//! from the trigger sources at a fixed rate. The compositor itself is a
//! trait; [`SoftwareCompositor`] composes in memory for any [`FrameSink`].

pub mod builders;
pub mod compositor;
pub mod content;
pub mod geometry;
pub mod overlay;
pub mod scheduler;
pub mod software;

pub use compositor::{Compositor, DisplayInfo, ElementHandle, ElementSpec, Rect, ResourceHandle, Update};
pub use overlay::{OverlayKind, OverlaySlot};
pub use scheduler::{Scheduler, Triggers};
pub use software::{FrameSink, HeadlessSink, SoftwareCompositor};

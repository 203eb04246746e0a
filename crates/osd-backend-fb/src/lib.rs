//! Linux framebuffer output for the OSD.
//!
//! [`FbdevSink`] plugs into the software compositor: composed frames are
//! alpha-blended straight onto `/dev/fbN` in its native pixel format.

pub mod format;
pub mod sink;

pub use format::PixelFormat;
pub use sink::{FbGeometry, FbdevSink};

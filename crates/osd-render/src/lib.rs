//! Software rendering for OSD overlays.
//!
//! Everything here draws into a caller-owned [`PixelBuffer`] of packed RGBA
//! pixels. Drawing replaces pixels rather than blending them: overlay
//! transparency is resolved later by the compositor, so a translucent
//! background written here stays translucent on screen.

pub mod buffer;
pub mod font;
pub mod image;
pub mod procedural;
pub mod text;

pub use buffer::PixelBuffer;
pub use text::{TextBox, TextStyle, draw_glyph, draw_text, measure_text};

//! Procedural icons used when the configured PNG images cannot be loaded.
//!
//! Both icons keep the pixel landmarks the icon builders sample: the battery
//! bar colour at (9, 13), the empty-bar colour at (34, 13) and the CPU label
//! background at (30, 13).

use osd_types::color::Color;
use osd_types::error::Result;

use crate::buffer::PixelBuffer;

pub const ICON_W: u32 = 48;
pub const ICON_H: u32 = 28;

const SHELL: Color = Color::rgb(0xe8, 0xe8, 0xe8);
const CAVITY: Color = Color::rgb(0x30, 0x30, 0x30);
const LOW_BAR: Color = Color::rgb(0xe0, 0x30, 0x20);
const DIE: Color = Color::rgb(0x20, 0x24, 0x2c);
const PIN: Color = Color::rgb(0xb0, 0xb0, 0xa0);

/// Battery outline with a nearly empty bar.
///
/// The cavity spans (4, 6) to (38, 20), matching the bar the low-battery
/// builder draws at `(4, 6, 35 * soc / 100, 15)`.
pub fn battery_icon() -> Result<PixelBuffer> {
    let mut buf = PixelBuffer::try_new(ICON_W, ICON_H)?;
    // Shell and terminal nub.
    buf.fill_rect(1, 3, 41, 21, SHELL);
    buf.fill_rect(42, 9, 4, 9, SHELL);
    // Cavity.
    buf.fill_rect(3, 5, 37, 17, CAVITY);
    buf.fill_rect(4, 6, 8, 15, LOW_BAR);
    Ok(buf)
}

/// Chip package with pins on both long edges and a flat label area.
pub fn cpu_icon() -> Result<PixelBuffer> {
    let mut buf = PixelBuffer::try_new(ICON_W, ICON_H)?;
    for px in (6..42).step_by(6) {
        buf.fill_rect(px, 0, 3, 4, PIN);
        buf.fill_rect(px, 24, 3, 4, PIN);
    }
    buf.fill_rect(0, 3, 48, 22, SHELL);
    buf.fill_rect(2, 5, 44, 18, DIE);
    // Pin-one marker, outside the label area.
    buf.fill_rect(40, 18, 3, 3, SHELL);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_landmarks() {
        let icon = battery_icon().unwrap();
        assert_eq!((icon.width(), icon.height()), (ICON_W, ICON_H));
        assert_eq!(icon.pixel(9, 13), Some(LOW_BAR));
        assert_eq!(icon.pixel(34, 13), Some(CAVITY));
        // Full bar region is inside the cavity.
        for (x, y) in [(4, 6), (38, 6), (4, 20), (38, 20)] {
            assert_ne!(icon.pixel(x, y), Some(SHELL), "({x},{y})");
        }
        assert_eq!(icon.pixel(44, 13), Some(SHELL));
        assert_eq!(icon.pixel(0, 0), Some(Color::TRANSPARENT));
    }

    #[test]
    fn cpu_label_area_is_flat() {
        let icon = cpu_icon().unwrap();
        assert_eq!(icon.pixel(30, 13), Some(DIE));
        // "%3dC" at (3, 7) covers 32x8 pixels.
        for y in 7..15 {
            for x in 3..35 {
                assert_eq!(icon.pixel(x, y), Some(DIE), "({x},{y})");
            }
        }
        assert_eq!(icon.pixel(6, 0), Some(PIN));
    }
}

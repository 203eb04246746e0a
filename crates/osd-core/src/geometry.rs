//! Overlay buffer sizes and screen placement.

use osd_render::font::GLYPH_H;
use osd_types::config::{IconCorner, TinyOsdPosition};

use crate::compositor::{DisplayInfo, Rect};

/// Round up to a multiple of 16.
pub const fn align16(v: u32) -> u32 {
    v.saturating_add(15) & !15
}

/// Buffer size of the full OSD: `max_lines` text rows plus padding fill the
/// display height once scaled up.
pub fn full_osd_size(display: DisplayInfo, padding: u32, max_lines: u32) -> (u32, u32) {
    let content_h = f64::from(padding * 2 + max_lines * GLYPH_H as u32).max(1.0);
    let scaling = (f64::from(display.height) / content_h).max(f64::EPSILON);
    (
        align16((f64::from(display.width) / scaling) as u32).max(16),
        align16((f64::from(display.height) / scaling) as u32).max(16),
    )
}

/// Compact OSD: one glyph row, stretched over a band `height_percent` of the
/// display high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TinyLayout {
    pub width: u32,
    pub height: u32,
    pub dest: Rect,
}

pub fn tiny_osd_layout(display: DisplayInfo, height_percent: u32, position: TinyOsdPosition) -> TinyLayout {
    let dest_h = ((f64::from(display.height) * f64::from(height_percent) / 100.0) as u32).max(1);
    let downsizing = f64::from(dest_h) / f64::from(GLYPH_H as u32);
    let width = align16((f64::from(display.width) / downsizing) as u32).max(16);
    let y = match position {
        TinyOsdPosition::Top => 0,
        TinyOsdPosition::Bottom => display.height.saturating_sub(dest_h) as i32,
    };
    TinyLayout {
        width,
        height: GLYPH_H as u32,
        dest: Rect::new(0, y, display.width, dest_h),
    }
}

/// Warning icons stack away from the configured corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconLayout {
    display: DisplayInfo,
    corner: IconCorner,
    height: u32,
    padding: u32,
}

impl IconLayout {
    pub fn new(display: DisplayInfo, corner: IconCorner, height_percent: u32, padding: u32) -> Self {
        let height = ((f64::from(display.height) * f64::from(height_percent) / 100.0) as u32).max(1);
        Self {
            display,
            corner,
            height,
            padding,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// On-screen width keeping the image aspect ratio.
    pub fn width_for(&self, image_w: u32, image_h: u32) -> u32 {
        if image_h == 0 {
            return self.height;
        }
        (u64::from(self.height) * u64::from(image_w) / u64::from(image_h)) as u32
    }

    /// Y of the first icon.
    pub fn start_y(&self) -> i32 {
        if self.corner.is_top() {
            self.padding as i32
        } else {
            self.display.height as i32 - self.padding as i32 - self.height as i32
        }
    }

    /// Offset from one stacked icon to the next.
    pub fn step(&self) -> i32 {
        if self.corner.is_top() {
            self.height as i32
        } else {
            -(self.height as i32)
        }
    }

    /// Destination of an icon of `width` at row `y`.
    pub fn dest(&self, width: u32, y: i32) -> Rect {
        let x = if self.corner.is_left() {
            self.padding as i32
        } else {
            self.display.width as i32 - self.padding as i32 - width as i32
        };
        Rect::new(x, y, width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: DisplayInfo = DisplayInfo {
        width: 640,
        height: 480,
    };

    #[test]
    fn align() {
        assert_eq!(align16(0), 0);
        assert_eq!(align16(1), 16);
        assert_eq!(align16(16), 16);
        assert_eq!(align16(17), 32);
    }

    #[test]
    fn full_osd_defaults() {
        // 480 / (10 + 128) = 3.478x
        assert_eq!(full_osd_size(DISPLAY, 5, 16), (192, 144));
    }

    #[test]
    fn full_osd_degenerate_display() {
        let (w, h) = full_osd_size(DisplayInfo { width: 0, height: 0 }, 0, 1);
        assert!(w >= 16 && h >= 16);
    }

    #[test]
    fn tiny_layout_top_and_bottom() {
        let top = tiny_osd_layout(DISPLAY, 5, TinyOsdPosition::Top);
        // 24 px band, 3x downsizing.
        assert_eq!(top.dest, Rect::new(0, 0, 640, 24));
        assert_eq!((top.width, top.height), (224, 8));
        let bottom = tiny_osd_layout(DISPLAY, 5, TinyOsdPosition::Bottom);
        assert_eq!(bottom.dest.y, 456);
    }

    #[test]
    fn icons_stack_from_corner() {
        let top_right = IconLayout::new(DISPLAY, IconCorner::TopRight, 10, 10);
        assert_eq!(top_right.height(), 48);
        assert_eq!(top_right.width_for(48, 28), 82);
        assert_eq!(top_right.start_y(), 10);
        assert_eq!(top_right.step(), 48);
        assert_eq!(top_right.dest(82, 10), Rect::new(548, 10, 82, 48));

        let bottom_left = IconLayout::new(DISPLAY, IconCorner::BottomLeft, 10, 10);
        assert_eq!(bottom_left.start_y(), 480 - 10 - 48);
        assert_eq!(bottom_left.step(), -48);
        assert_eq!(bottom_left.dest(82, 0).x, 10);
    }
}

//! Warning icons drawn over their base image.
//!
//! Colors are sampled from the base image so custom PNGs keep their own
//! look: the battery bar at (9, 13), the empty bar at (34, 13) and the CPU
//! label area at (30, 13).

use osd_platform::services::SOC_WARN;
use osd_render::{PixelBuffer, TextStyle};
use osd_types::color::Color;

use super::ContentStyle;
use crate::content::{DrawOp, Frame};

const BAR_SAMPLE: (i32, i32) = (9, 13);
const BAR_BG_SAMPLE: (i32, i32) = (34, 13);
const CPU_BG_SAMPLE: (i32, i32) = (30, 13);

/// Battery bar area inside the icon.
const BAR_X: i32 = 4;
const BAR_Y: i32 = 6;
const BAR_W: i32 = 35;
const BAR_H: i32 = 15;

/// CPU label area.
const LABEL_X: i32 = 3;
const LABEL_Y: i32 = 7;
const LABEL_W: i32 = 32;
const LABEL_H: i32 = 15;

fn sample(base: &PixelBuffer, (x, y): (i32, i32)) -> Color {
    base.pixel_or(x, y, Color::TRANSPARENT)
}

/// Low-battery icon. Without a charge reading the base image is shown as is.
pub fn battery(soc: Option<i32>, base: &PixelBuffer, style: &ContentStyle) -> Frame {
    let mut frame = Frame::new();
    frame.push(DrawOp::Base);
    let Some(soc) = soc else {
        return frame;
    };

    let bar_bg = sample(base, BAR_BG_SAMPLE);
    let color = if soc <= style.low_limit {
        style.palette.crit
    } else if soc <= SOC_WARN {
        style.palette.warn
    } else {
        sample(base, BAR_SAMPLE)
    };

    frame.push(DrawOp::Rect {
        x: BAR_X,
        y: BAR_Y,
        w: BAR_W,
        h: BAR_H,
        color: bar_bg,
    });
    frame.push(DrawOp::Rect {
        x: BAR_X,
        y: BAR_Y,
        w: BAR_W * soc.clamp(0, 100) / 100,
        h: BAR_H,
        color,
    });
    frame.text(BAR_X + 2, BAR_Y, format!("{soc:>3}%"), TextStyle::outlined(color, bar_bg));
    frame
}

/// CPU temperature icon.
pub fn cpu(temp: Option<i32>, base: &PixelBuffer, style: &ContentStyle) -> Frame {
    let mut frame = Frame::new();
    frame.push(DrawOp::Base);
    let Some(temp) = temp else {
        return frame;
    };

    let color = style.temp_color(Some(temp), Color::BLACK);
    frame.push(DrawOp::Rect {
        x: LABEL_X,
        y: LABEL_Y,
        w: LABEL_W,
        h: LABEL_H,
        color: sample(base, CPU_BG_SAMPLE),
    });
    frame.text(LABEL_X, LABEL_Y, format!("{temp:>3}C"), TextStyle::plain(color));
    frame
}

//! Compact OSD: a one-line header bar.
//!
//! Items fill in from both edges, separated by glyph 1, with a thin line
//! joining the two sides:
//!
//! ```text
//! [bat]  80% 3.91v | [cpu] 48C  12% ------ | [wifi] 72Mb | [bl] 75% | 12:00:00
//! ```

use osd_platform::services::{BatteryStatus, NetInterface, WifiLink};
use osd_render::TextStyle;
use osd_render::font::{GLYPH_H, GLYPH_W, ICON_BACKLIGHT, ICON_BATTERY, ICON_BITS, ICON_CPU, ICON_MEGA, ICON_SEPARATOR, ICON_WIFI};
use osd_types::color::Color;
use osd_types::config::TinyOsdPosition;

use super::{ContentStyle, Readings};
use crate::content::{DrawOp, Frame};

/// Gap between an icon glyph and its text.
const ICON_GAP: i32 = 2;
/// Link speeds below these read critical and warn (Mbit/s).
const SPEED_CRIT: i32 = 5;
const SPEED_WARN: i32 = 38;
/// Signal magnitudes above these read critical and warn (-dBm).
const SIGNAL_CRIT: i32 = 60;
const SIGNAL_WARN: i32 = 30;

pub fn battery_text(battery: &BatteryStatus) -> Option<String> {
    match (battery.soc, battery.voltage) {
        (Some(soc), Some(v)) => Some(format!("{soc:>3}% {v:.2}v")),
        (Some(soc), None) => Some(format!("{soc:>3}%")),
        (None, Some(v)) => Some(format!("{v:.3}v")),
        (None, None) => None,
    }
}

pub fn cpu_text(temp: Option<i32>, load: Option<i32>) -> Option<String> {
    match (temp, load) {
        (Some(t), load) => Some(format!("{t}C {:>3}%", load.unwrap_or(0))),
        (None, Some(load)) => Some(format!("{load:>3}%")),
        (None, None) => None,
    }
}

/// First interface with a known link speed.
pub fn wifi_link(network: &[NetInterface]) -> Option<WifiLink> {
    network
        .iter()
        .filter_map(|iface| iface.link)
        .find(|link| link.speed > 0)
}

fn speed_color(speed: i32, style: &ContentStyle) -> Color {
    let p = &style.palette;
    if speed < SPEED_CRIT {
        p.crit
    } else if speed < SPEED_WARN {
        p.warn
    } else {
        p.text
    }
}

fn signal_color(signal: i32, style: &ContentStyle) -> Color {
    let p = &style.palette;
    if signal > SIGNAL_CRIT {
        p.crit
    } else if signal > SIGNAL_WARN {
        p.warn
    } else {
        p.text
    }
}

fn text_width(text: &str) -> i32 {
    text.chars().count() as i32 * GLYPH_W
}

/// Build the bar for a `width` pixel wide, one glyph high buffer.
pub fn build(readings: &Readings, style: &ContentStyle, width: u32, position: TinyOsdPosition) -> Frame {
    let p = &style.palette;
    let plain = TextStyle::plain;
    let width = width as i32;
    let mut frame = Frame::new();
    frame.push(DrawOp::Fill(p.bg));

    let mut left = 0;
    let mut right = width;

    if let Some(clock) = &readings.clock {
        let text = clock.short();
        right -= text_width(&text);
        frame.text(right, 0, text, plain(p.text));
        right -= GLYPH_W;
        frame.glyph(right, 0, ICON_SEPARATOR, p.separator);
    }

    if let Some(text) = battery_text(&readings.battery) {
        let color = style.battery_color(&readings.battery, p.text);
        frame.glyph(left, 0, ICON_BATTERY, color);
        left += GLYPH_W + ICON_GAP;
        let end = left + text_width(&text);
        frame.text(left, 0, text, plain(color));
        left = end;
        frame.glyph(left, 0, ICON_SEPARATOR, p.separator);
        left += GLYPH_W;
    }

    if let Some(text) = cpu_text(readings.cpu_temp, readings.cpu_load) {
        let color = style.temp_color(readings.cpu_temp, p.text);
        frame.glyph(left, 0, ICON_CPU, color);
        left += GLYPH_W + ICON_GAP;
        frame.text(left, 0, text.clone(), plain(color));
        left += text_width(&text);
        frame.glyph(left, 0, ICON_SEPARATOR, p.separator);
        left += GLYPH_W;
    }

    if let Some(bl) = readings.backlight {
        let text = match bl.percent() {
            Some(pct) => format!("{pct:.0}%"),
            None => bl.level.to_string(),
        };
        right -= text_width(&text);
        frame.text(right, 0, text, plain(p.text));
        right -= GLYPH_W + ICON_GAP;
        frame.glyph(right, 0, ICON_BACKLIGHT, p.text);
        right -= GLYPH_W;
        frame.glyph(right, 0, ICON_SEPARATOR, p.separator);
    }

    if let Some(link) = wifi_link(&readings.network) {
        let color = speed_color(link.speed, style);
        right -= 2 * GLYPH_W;
        frame.text(right, 0, format!("{ICON_MEGA}{ICON_BITS}"), plain(color));
        let speed = link.speed.to_string();
        right -= text_width(&speed);
        frame.text(right, 0, speed, plain(color));

        let icon_color = if link.signal > 0 {
            signal_color(link.signal, style)
        } else {
            p.text
        };
        right -= GLYPH_W + ICON_GAP;
        frame.glyph(right, 0, ICON_WIFI, icon_color);
        right -= GLYPH_W;
        frame.glyph(right, 0, ICON_SEPARATOR, p.separator);
    }

    frame.push(DrawOp::HLine {
        x1: left - GLYPH_W / 2,
        x2: right + GLYPH_W / 2,
        y: GLYPH_H / 2 - 1,
        color: p.separator,
    });

    let edge = match position {
        TinyOsdPosition::Top => GLYPH_H - 1,
        TinyOsdPosition::Bottom => 0,
    };
    frame.push(DrawOp::HLine {
        x1: 0,
        x2: width,
        y: edge,
        color: p.separator,
    });

    frame
}

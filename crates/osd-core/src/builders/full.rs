//! Full OSD: a multi-line system overview.
//!
//! ```text
//! Uptime: 00:12:41
//! Battery: 80% (3.912v)
//! System: CPU: 48C (12% load)
//!         RAM: 120/926M (12% used)
//! Backlight: 5/8
//! Network: wlan0: 192.168.1.20
//!                 72Mbits, -52dBm
//! ```

use osd_platform::services::{BatteryStatus, MemoryUsage, NetInterface};
use osd_render::TextStyle;
use osd_render::font::{GLYPH_H, GLYPH_W};
use osd_types::color::Color;

use super::{ContentStyle, Readings};
use crate::content::{DrawOp, Frame};

/// Percent above which memory lines turn to the warn color.
const MEMORY_WARN: i64 = 95;

pub fn battery_text(battery: &BatteryStatus) -> Option<String> {
    match (battery.soc, battery.voltage) {
        (Some(soc), Some(v)) => Some(format!("{soc}% ({v:.3}v)")),
        (Some(soc), None) => Some(format!("{soc}%")),
        (None, Some(v)) => Some(format!("{v:.3}v")),
        (None, None) => None,
    }
}

pub fn cpu_text(temp: Option<i32>, load: Option<i32>) -> Option<String> {
    match (temp, load) {
        (Some(t), load) => Some(format!("CPU: {t}C ({}% load)", load.unwrap_or(0))),
        (None, Some(load)) => Some(format!("CPU: {load}%")),
        (None, None) => None,
    }
}

fn memory_text(label: &str, mem: &MemoryUsage) -> String {
    format!("{label}: {}/{}M ({}% used)", mem.used, mem.total, mem.percent())
}

/// Second line under an interface, e.g. `72Mbits, -52dBm`.
pub fn link_text(iface: &NetInterface) -> Option<String> {
    let link = iface.link?;
    match (link.speed, link.signal) {
        (0, 0) => None,
        (speed, 0) => Some(format!("{speed}Mbits")),
        (0, signal) => Some(format!("-{signal}dBm")),
        (speed, signal) => Some(format!("{speed}Mbits, -{signal}dBm")),
    }
}

pub fn build(readings: &Readings, style: &ContentStyle) -> Frame {
    let palette = &style.palette;
    let pad = style.padding;
    let outlined = |color: Color| TextStyle::outlined(color, palette.text_bg);
    let mut frame = Frame::new();
    frame.push(DrawOp::Fill(palette.bg));

    let mut column = pad;
    let mut y = pad;

    if let Some(clock) = &readings.clock {
        frame.text(column, y, clock.long(), outlined(palette.text));
        y += pad + GLYPH_H;
    }

    if let Some(text) = battery_text(&readings.battery) {
        let color = style.battery_color(&readings.battery, palette.text);
        frame.text(column, y, format!("Battery: {text}"), outlined(color));
        y += pad + GLYPH_H;
    }

    let cpu = cpu_text(readings.cpu_temp, readings.cpu_load);
    if cpu.is_some() || readings.memory.is_some() || readings.gpu.is_some() {
        frame.text(column, y, "System:", outlined(palette.text));
        column = pad * 2 + GLYPH_W * 7;
        if let Some(text) = cpu {
            let color = style.temp_color(readings.cpu_temp, palette.text);
            frame.text(column, y, text, outlined(color));
            y += GLYPH_H;
        }
        for (label, mem) in [("RAM", &readings.memory), ("GPU", &readings.gpu)] {
            if let Some(mem) = mem {
                let color = if mem.percent() > MEMORY_WARN {
                    palette.warn
                } else {
                    palette.text
                };
                frame.text(column, y, memory_text(label, mem), outlined(color));
                y += GLYPH_H;
            }
        }
        y += pad;
        column = pad;
    }

    if let Some(bl) = readings.backlight {
        let text = match bl.max {
            Some(max) => format!("Backlight: {}/{max}", bl.level),
            None => format!("Backlight: {}", bl.level),
        };
        frame.text(column, y, text, outlined(palette.text));
        y += pad + GLYPH_H;
    }

    if !readings.network.is_empty() {
        frame.text(column, y, "Network:", outlined(palette.text));
        column = pad * 2 + GLYPH_W * 8;
        for iface in &readings.network {
            frame.text(column, y, format!("{}: {}", iface.name, iface.addr), outlined(palette.text));
            y += GLYPH_H;
            if let Some(text) = link_text(iface) {
                let indent = (iface.name.chars().count() as i32 + 2) * GLYPH_W;
                frame.text(column + indent, y, text, outlined(palette.text));
                y += GLYPH_H;
            }
        }
    }

    frame
}

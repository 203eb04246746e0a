//! Packed RGBA color model and textual color parsing.
//!
//! Colors are written in configuration files as HTML-style hex strings
//! (`"RGB"`, `"RGBA"`, `"RRGGBB"`, `"RRGGBBAA"`). The alpha digits express
//! *transparency*: `00` is fully opaque and `ff` fully transparent. The stored
//! [`Color::a`] is therefore the inverse of the parsed value, so it reads as
//! ordinary opacity everywhere else in the daemon.

use crate::error::{OsdError, Result};

/// A color in RGBA format (0-255 per channel, `a` = opacity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Return the same color with a different alpha value.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self {
            r: self.r,
            g: self.g,
            b: self.b,
            a,
        }
    }

    /// Pack into the pixel layout used by every buffer: R in the low byte,
    /// A in the high byte.
    pub const fn to_packed(self) -> u32 {
        (self.r as u32) | (self.g as u32) << 8 | (self.b as u32) << 16 | (self.a as u32) << 24
    }

    /// Inverse of [`Color::to_packed`].
    pub const fn from_packed(px: u32) -> Self {
        Self {
            r: px as u8,
            g: (px >> 8) as u8,
            b: (px >> 16) as u8,
            a: (px >> 24) as u8,
        }
    }

    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// Parse an HTML-style hex color (without or with a leading `#`).
///
/// Accepts 3, 4, 6 or 8 hex digits. A missing alpha component is treated as
/// a parsed `0` before inversion, i.e. opaque.
pub fn parse_color(text: &str) -> Result<Color> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    let width = match hex.len() {
        3 | 4 => 1,
        6 | 8 => 2,
        len => {
            return Err(OsdError::InvalidFormat(format!(
                "color '{text}' has {len} digits (expect 3/4 for one hex per channel, 6/8 for two)"
            )));
        }
    };
    if !hex.is_ascii() {
        return Err(OsdError::InvalidFormat(format!("color '{text}' is not hex")));
    }

    let mut channels = [0u8; 4];
    for (i, channel) in channels.iter_mut().enumerate() {
        let start = i * width;
        let Some(digits) = hex.get(start..start + width) else {
            break;
        };
        let value = u8::from_str_radix(digits, 16)
            .map_err(|_| OsdError::InvalidFormat(format!("color '{text}' is not hex")))?;
        *channel = if width == 1 { value * 0x11 } else { value };
    }
    channels[3] = 255 - channels[3];

    Ok(Color::rgba(channels[0], channels[1], channels[2], channels[3]))
}

/// Parse a color, logging and substituting `fallback` on failure.
pub fn parse_color_or(text: &str, fallback: Color, what: &str) -> Color {
    match parse_color(text) {
        Ok(color) => color,
        Err(e) => {
            log::warn!("invalid {what} color, using default: {e}");
            fallback
        }
    }
}

/// Midpoint between text and background, used for separators.
pub fn separator_color(text: Color, bg: Color) -> Color {
    let mid = |a: u8, b: u8| ((a as u16 + b as u16) / 2) as u8;
    Color::rgba(
        mid(text.r, bg.r),
        mid(text.g, bg.g),
        mid(text.b, bg.b),
        mid(text.a, bg.a),
    )
}

/// Background tint drawn behind text: halfway between `bg` opacity and opaque.
pub fn text_bg_tint(bg: Color) -> Color {
    bg.with_alpha(bg.a + (255 - bg.a) / 2)
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// Fully resolved color set used by every overlay builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub text: Color,
    pub warn: Color,
    pub crit: Color,
    /// Outline/background tint for text drawn on the full OSD.
    pub text_bg: Color,
    /// Separator lines and glyphs.
    pub separator: Color,
}

impl Palette {
    /// Resolve the four configured color strings, falling back to the
    /// built-in defaults for any that fail to parse.
    pub fn resolve(bg: &str, text: &str, warn: &str, crit: &str) -> Self {
        let defaults = Self::default();
        let bg = parse_color_or(bg, defaults.bg, "background");
        let text = parse_color_or(text, defaults.text, "text");
        let warn = parse_color_or(warn, defaults.warn, "warning");
        let crit = parse_color_or(crit, defaults.crit, "critical");
        Self::from_base(bg, text, warn, crit)
    }

    /// Build a palette and its derived colors from the four base colors.
    pub fn from_base(bg: Color, text: Color, warn: Color, crit: Color) -> Self {
        Self {
            bg,
            text,
            warn,
            crit,
            text_bg: text_bg_tint(bg),
            separator: separator_color(text, bg),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        // "00000050", "FFFFFF", "ffa038", "ff5548"
        Self::from_base(
            Color::rgba(0, 0, 0, 0xaf),
            Color::WHITE,
            Color::rgb(0xff, 0xa0, 0x38),
            Color::rgb(0xff, 0x55, 0x48),
        )
    }
}

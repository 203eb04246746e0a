//! Framebuffer pixel formats.

use osd_types::color::Color;
use osd_types::error::{OsdError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32 bpp, bytes B, G, R, X in memory.
    Bgrx8888,
    /// 16 bpp little-endian 5-6-5.
    Rgb565,
}

impl PixelFormat {
    pub fn from_bpp(bits_per_pixel: u32) -> Result<Self> {
        match bits_per_pixel {
            32 => Ok(Self::Bgrx8888),
            16 => Ok(Self::Rgb565),
            other => Err(OsdError::Display(format!("unsupported framebuffer depth: {other} bpp"))),
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgrx8888 => 4,
            Self::Rgb565 => 2,
        }
    }

    /// Write the color of packed pixel `px` into `out`. Alpha is dropped.
    pub fn encode(self, px: u32, out: &mut [u8]) {
        let c = Color::from_packed(px);
        match self {
            Self::Bgrx8888 => out[..4].copy_from_slice(&[c.b, c.g, c.r, 0xff]),
            Self::Rgb565 => {
                let v = (u16::from(c.r) & 0xf8) << 8 | (u16::from(c.g) & 0xfc) << 3 | u16::from(c.b) >> 3;
                out[..2].copy_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Read one pixel as an opaque packed color.
    pub fn decode(self, bytes: &[u8]) -> u32 {
        match self {
            Self::Bgrx8888 => Color::rgb(bytes[2], bytes[1], bytes[0]).to_packed(),
            Self::Rgb565 => {
                let v = u16::from_le_bytes([bytes[0], bytes[1]]);
                let r5 = (v >> 11) as u8 & 0x1f;
                let g6 = (v >> 5) as u8 & 0x3f;
                let b5 = v as u8 & 0x1f;
                Color::rgb(r5 << 3 | r5 >> 2, g6 << 2 | g6 >> 4, b5 << 3 | b5 >> 2).to_packed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encoded(format: PixelFormat, color: Color) -> Vec<u8> {
        let mut out = vec![0; format.bytes_per_pixel()];
        format.encode(color.to_packed(), &mut out);
        out
    }

    #[test]
    fn depth_selects_format() {
        assert_eq!(PixelFormat::from_bpp(32).unwrap(), PixelFormat::Bgrx8888);
        assert_eq!(PixelFormat::from_bpp(16).unwrap(), PixelFormat::Rgb565);
        let err = PixelFormat::from_bpp(24).unwrap_err();
        assert!(matches!(err, OsdError::Display(_)));
        assert_eq!(err.to_string(), "display error: unsupported framebuffer depth: 24 bpp");
    }

    #[test]
    fn bgrx_byte_order() {
        assert_eq!(encoded(PixelFormat::Bgrx8888, Color::rgb(1, 2, 3)), [3, 2, 1, 0xff]);
    }

    #[test]
    fn rgb565_primaries() {
        assert_eq!(encoded(PixelFormat::Rgb565, Color::rgb(255, 0, 0)), [0x00, 0xf8]);
        assert_eq!(encoded(PixelFormat::Rgb565, Color::rgb(0, 255, 0)), [0xe0, 0x07]);
        assert_eq!(encoded(PixelFormat::Rgb565, Color::rgb(0, 0, 255)), [0x1f, 0x00]);
        assert_eq!(PixelFormat::Rgb565.decode(&[0xff, 0xff]), Color::WHITE.to_packed());
        assert_eq!(PixelFormat::Rgb565.decode(&[0, 0]), Color::BLACK.to_packed());
    }

    proptest! {
        #[test]
        fn rgb565_keeps_high_bits(r: u8, g: u8, b: u8) {
            let bytes = encoded(PixelFormat::Rgb565, Color::rgb(r, g, b));
            let back = Color::from_packed(PixelFormat::Rgb565.decode(&bytes));
            prop_assert_eq!(back.r & 0xf8, r & 0xf8);
            prop_assert_eq!(back.g & 0xfc, g & 0xfc);
            prop_assert_eq!(back.b & 0xf8, b & 0xf8);
            prop_assert_eq!(back.a, 255);
        }
    }
}

//! Packed RGBA pixel buffer with clipped drawing primitives.
//!
//! Every primitive takes signed coordinates and silently clips against the
//! buffer bounds, so callers can position content relative to edges without
//! range checks of their own. None of them allocate.

use osd_types::color::Color;
use osd_types::error::{OsdError, Result};

/// An owned RGBA buffer, one packed `u32` per pixel (see [`Color::to_packed`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Allocate a transparent buffer.
    ///
    /// Allocation failure is reported as `ResourceExhausted` so an overlay
    /// can skip a tick instead of aborting the daemon.
    pub fn try_new(width: u32, height: u32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| OsdError::ResourceExhausted(format!("{width}x{height} buffer")))?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| OsdError::ResourceExhausted(format!("{width}x{height} buffer: {e}")))?;
        pixels.resize(len, 0);
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from tightly packed 8-bit RGBA bytes.
    pub fn from_rgba_bytes(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(OsdError::Image(format!(
                "pixel data size mismatch: expected {expected}, got {}",
                rgba.len()
            )));
        }
        let mut buf = Self::try_new(width, height)?;
        for (dst, src) in buf.pixels.iter_mut().zip(rgba.chunks_exact(4)) {
            *dst = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        }
        Ok(buf)
    }

    /// Tightly packed 8-bit RGBA bytes, row by row.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|px| px.to_le_bytes()).collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Set a single pixel. Out of bounds writes are dropped.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.index(i64::from(x), i64::from(y)) {
            self.pixels[i] = color.to_packed();
        }
    }

    /// Pixel color, `None` outside the buffer.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(i64::from(x), i64::from(y))
            .map(|i| Color::from_packed(self.pixels[i]))
    }

    /// Pixel color, `default` outside the buffer.
    pub fn pixel_or(&self, x: i32, y: i32, default: Color) -> Color {
        self.pixel(x, y).unwrap_or(default)
    }

    /// Fill the whole buffer.
    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color.to_packed());
    }

    /// Fill a `w` x `h` rectangle whose top-left corner is `(x, y)`.
    ///
    /// Zero or negative sizes draw nothing.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, x1) = self.clip_span(i64::from(x), i64::from(x) + i64::from(w) - 1, self.width);
        let (y0, y1) = self.clip_span(i64::from(y), i64::from(y) + i64::from(h) - 1, self.height);
        if x0 > x1 || y0 > y1 {
            return;
        }
        let packed = color.to_packed();
        let stride = self.width as usize;
        for row in y0..=y1 {
            let start = row * stride;
            self.pixels[start + x0..=start + x1].fill(packed);
        }
    }

    /// Horizontal line from `x1` to `x2` inclusive, in either order.
    pub fn hline(&mut self, x1: i32, x2: i32, y: i32, color: Color) {
        if y < 0 || i64::from(y) >= i64::from(self.height) {
            return;
        }
        let (lo, hi) = (x1.min(x2), x1.max(x2));
        let (x0, x1) = self.clip_span(i64::from(lo), i64::from(hi), self.width);
        if x0 > x1 {
            return;
        }
        let start = y as usize * self.width as usize;
        self.pixels[start + x0..=start + x1].fill(color.to_packed());
    }

    /// Vertical line from `y1` to `y2` inclusive, in either order.
    pub fn vline(&mut self, x: i32, y1: i32, y2: i32, color: Color) {
        if x < 0 || i64::from(x) >= i64::from(self.width) {
            return;
        }
        let (lo, hi) = (y1.min(y2), y1.max(y2));
        let (y0, y1) = self.clip_span(i64::from(lo), i64::from(hi), self.height);
        if y0 > y1 {
            return;
        }
        let packed = color.to_packed();
        let stride = self.width as usize;
        for row in y0..=y1 {
            self.pixels[row * stride + x as usize] = packed;
        }
    }

    /// Copy `src` with its top-left corner at `(x, y)`, replacing pixels.
    pub fn blit(&mut self, src: &PixelBuffer, x: i32, y: i32) {
        for sy in 0..src.height {
            let dy = i64::from(y) + i64::from(sy);
            for sx in 0..src.width {
                let dx = i64::from(x) + i64::from(sx);
                if let Some(i) = self.index(dx, dy) {
                    self.pixels[i] = src.pixels[(sy * src.width + sx) as usize];
                }
            }
        }
    }

    /// Clip an inclusive span to `[0, limit)`. Returns an empty span
    /// (`start > end`) when nothing is visible.
    fn clip_span(&self, start: i64, end: i64, limit: u32) -> (usize, usize) {
        let lo = start.max(0);
        let hi = end.min(i64::from(limit) - 1);
        if lo > hi {
            return (1, 0);
        }
        (lo as usize, hi as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RED: Color = Color::rgb(255, 0, 0);

    fn count(buf: &PixelBuffer, color: Color) -> usize {
        buf.pixels().iter().filter(|&&px| px == color.to_packed()).count()
    }

    #[test]
    fn new_buffer_is_transparent() {
        let buf = PixelBuffer::try_new(4, 3).unwrap();
        assert_eq!(buf.pixels().len(), 12);
        assert!(buf.pixels().iter().all(|&px| px == 0));
    }

    #[test]
    fn huge_buffer_is_resource_exhausted() {
        let err = PixelBuffer::try_new(u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, OsdError::ResourceExhausted(_)));
    }

    #[test]
    fn fill_covers_everything() {
        let mut buf = PixelBuffer::try_new(5, 5).unwrap();
        buf.fill(RED);
        assert_eq!(count(&buf, RED), 25);
    }

    #[test]
    fn fill_rect_uses_exclusive_size() {
        let mut buf = PixelBuffer::try_new(10, 10).unwrap();
        buf.fill_rect(2, 2, 3, 4, RED);
        assert_eq!(count(&buf, RED), 12);
        assert_eq!(buf.pixel(2, 2), Some(RED));
        assert_eq!(buf.pixel(4, 5), Some(RED));
        assert_eq!(buf.pixel(5, 5), Some(Color::TRANSPARENT));
    }

    #[test]
    fn fill_rect_clips_negative() {
        let mut buf = PixelBuffer::try_new(10, 10).unwrap();
        buf.fill_rect(-2, -2, 5, 5, RED);
        assert_eq!(count(&buf, RED), 9);
        assert_eq!(buf.pixel(0, 0), Some(RED));
    }

    #[test]
    fn fill_rect_zero_size_draws_nothing() {
        let mut buf = PixelBuffer::try_new(4, 4).unwrap();
        buf.fill_rect(1, 1, 0, 3, RED);
        buf.fill_rect(1, 1, 3, -1, RED);
        assert_eq!(count(&buf, RED), 0);
    }

    #[test]
    fn lines_are_inclusive_and_unordered() {
        let mut buf = PixelBuffer::try_new(8, 8).unwrap();
        buf.hline(6, 1, 3, RED);
        assert_eq!(count(&buf, RED), 6);
        buf.vline(0, 7, 0, RED);
        assert_eq!(count(&buf, RED), 14);
    }

    #[test]
    fn lines_outside_are_dropped() {
        let mut buf = PixelBuffer::try_new(8, 8).unwrap();
        buf.hline(0, 7, -1, RED);
        buf.hline(0, 7, 8, RED);
        buf.vline(-1, 0, 7, RED);
        buf.vline(8, 0, 7, RED);
        buf.hline(-10, -2, 3, RED);
        assert_eq!(count(&buf, RED), 0);
    }

    #[test]
    fn pixel_outside_is_none() {
        let buf = PixelBuffer::try_new(2, 2).unwrap();
        assert_eq!(buf.pixel(-1, 0), None);
        assert_eq!(buf.pixel(2, 0), None);
        assert_eq!(buf.pixel_or(0, 5, Color::BLACK), Color::BLACK);
    }

    #[test]
    fn rgba_bytes_conversion() {
        let buf = PixelBuffer::from_rgba_bytes(1, 2, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(Color::rgba(1, 2, 3, 4)));
        assert_eq!(buf.pixel(0, 1), Some(Color::rgba(5, 6, 7, 8)));
        assert_eq!(buf.to_rgba_bytes(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(PixelBuffer::from_rgba_bytes(2, 2, &[0; 8]).is_err());
    }

    #[test]
    fn blit_clips_to_destination() {
        let mut src = PixelBuffer::try_new(3, 3).unwrap();
        src.fill(RED);
        let mut dst = PixelBuffer::try_new(4, 4).unwrap();
        dst.blit(&src, 2, -1);
        assert_eq!(count(&dst, RED), 4);
        assert_eq!(dst.pixel(3, 0), Some(RED));
    }

    proptest! {
        #[test]
        fn primitives_never_write_out_of_bounds(
            w in 1u32..24, h in 1u32..24,
            x in -40i32..40, y in -40i32..40,
            rw in -10i32..60, rh in -10i32..60,
            x2 in i32::MIN..i32::MAX, y2 in i32::MIN..i32::MAX,
        ) {
            let mut buf = PixelBuffer::try_new(w, h).unwrap();
            buf.fill_rect(x, y, rw, rh, RED);
            buf.fill_rect(x2, y2, i32::MAX, i32::MAX, RED);
            buf.hline(x, x2, y, RED);
            buf.vline(x, y, y2, RED);
            buf.set_pixel(x2, y2, RED);
            prop_assert_eq!(buf.pixels().len(), (w * h) as usize);

            // Everything painted must lie inside the requested rectangle clip.
            let mut expect = PixelBuffer::try_new(w, h).unwrap();
            expect.fill_rect(x, y, rw, rh, RED);
            for py in 0..h as i32 {
                for px in 0..w as i32 {
                    if expect.pixel(px, py) == Some(RED) {
                        prop_assert_eq!(buf.pixel(px, py), Some(RED));
                    }
                }
            }
        }
    }
}

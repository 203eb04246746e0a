//! Text layout on top of the bitmap font.

use osd_types::color::Color;

use crate::buffer::PixelBuffer;
use crate::font::{GLYPH_H, GLYPH_W, glyph};

/// How a run of text is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub color: Color,
    /// One pixel halo around every glyph stroke.
    pub outline: Option<Color>,
    /// Opaque box filled behind the text before drawing.
    pub background: Option<Color>,
}

impl TextStyle {
    pub const fn plain(color: Color) -> Self {
        Self {
            color,
            outline: None,
            background: None,
        }
    }

    pub const fn outlined(color: Color, outline: Color) -> Self {
        Self {
            color,
            outline: Some(outline),
            background: None,
        }
    }

    pub const fn with_background(self, background: Color) -> Self {
        Self {
            background: Some(background),
            ..self
        }
    }
}

/// Where drawing stopped and how much space the text occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextBox {
    /// Cursor x after the last glyph of the last line.
    pub end_x: i32,
    /// Top y of the last line.
    pub end_y: i32,
    pub width: i32,
    pub height: i32,
}

/// Draw one glyph with its top-left at `(x, y)`. Returns the cursor after it.
pub fn draw_glyph(buf: &mut PixelBuffer, x: i32, y: i32, ch: char, color: Color) -> i32 {
    let bits = glyph(ch);
    for (row, &line) in bits.iter().enumerate() {
        if line == 0 {
            continue;
        }
        for col in 0..GLYPH_W {
            if line & (0x80 >> col) != 0 {
                buf.set_pixel(x + col, y + row as i32, color);
            }
        }
    }
    x + GLYPH_W
}

/// Size of `text` in pixels, without outline border.
pub fn measure_text(text: &str) -> (i32, i32) {
    if text.is_empty() {
        return (0, 0);
    }
    let mut widest = 0;
    let mut lines = 0;
    for line in text.split('\n') {
        widest = widest.max(line.chars().count() as i32);
        lines += 1;
    }
    (widest * GLYPH_W, lines * GLYPH_H)
}

/// Draw `text` left to right starting at `(x, y)`, wrapping on `'\n'`.
pub fn draw_text(buf: &mut PixelBuffer, x: i32, y: i32, text: &str, style: &TextStyle) -> TextBox {
    let (width, height) = measure_text(text);

    if let Some(bg) = style.background {
        let border = i32::from(style.outline.is_some());
        buf.fill_rect(
            x - border,
            y - border,
            width + 2 * border,
            height + 2 * border,
            bg,
        );
    }

    if let Some(outline) = style.outline {
        match OutlineMask::build(text, width, height) {
            Some(mask) => mask.paint(buf, x, y, style.color, outline),
            None => {
                log::warn!("no memory for text outline mask, drawing plain text");
                draw_runs(buf, x, y, text, style.color);
            }
        }
    } else {
        draw_runs(buf, x, y, text, style.color);
    }

    let last = text.rsplit('\n').next().unwrap_or("");
    let line_count = text.split('\n').count() as i32;
    TextBox {
        end_x: x + last.chars().count() as i32 * GLYPH_W,
        end_y: y + (line_count - 1) * GLYPH_H,
        width,
        height,
    }
}

fn draw_runs(buf: &mut PixelBuffer, x: i32, y: i32, text: &str, color: Color) {
    for (i, line) in text.split('\n').enumerate() {
        let mut cx = x;
        let cy = y + i as i32 * GLYPH_H;
        for ch in line.chars() {
            cx = draw_glyph(buf, cx, cy, ch, color);
        }
    }
}

// ---------------------------------------------------------------------------
// Outline mask
// ---------------------------------------------------------------------------

const EMPTY: u8 = 0;
const FILL: u8 = 1;
const EDGE: u8 = 2;

/// Text coverage with a one pixel border. Cells are `EMPTY`, `FILL` (glyph
/// stroke) or `EDGE` (within one pixel of a stroke, in any of 8 directions).
struct OutlineMask {
    stride: usize,
    rows: usize,
    cells: Vec<u8>,
}

impl OutlineMask {
    fn build(text: &str, width: i32, height: i32) -> Option<Self> {
        let stride = width as usize + 2;
        let rows = height as usize + 2;
        let len = stride.checked_mul(rows)?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(len).ok()?;
        cells.resize(len, EMPTY);

        for (li, line) in text.split('\n').enumerate() {
            for (ci, ch) in line.chars().enumerate() {
                let ox = 1 + ci * GLYPH_W as usize;
                let oy = 1 + li * GLYPH_H as usize;
                for (row, &bits) in glyph(ch).iter().enumerate() {
                    for col in 0..GLYPH_W as usize {
                        if bits & (0x80 >> col) != 0 {
                            cells[(oy + row) * stride + ox + col] = FILL;
                        }
                    }
                }
            }
        }

        let mut mask = Self {
            stride,
            rows,
            cells,
        };
        mask.dilate();
        Some(mask)
    }

    fn dilate(&mut self) {
        for my in 0..self.rows {
            for mx in 0..self.stride {
                if self.cells[my * self.stride + mx] != EMPTY {
                    continue;
                }
                if self.touches_fill(mx, my) {
                    self.cells[my * self.stride + mx] = EDGE;
                }
            }
        }
    }

    fn touches_fill(&self, mx: usize, my: usize) -> bool {
        let y0 = my.saturating_sub(1);
        let y1 = (my + 1).min(self.rows - 1);
        let x0 = mx.saturating_sub(1);
        let x1 = (mx + 1).min(self.stride - 1);
        (y0..=y1).any(|ny| (x0..=x1).any(|nx| self.cells[ny * self.stride + nx] == FILL))
    }

    /// Composite outline first, then the fill on top.
    fn paint(&self, buf: &mut PixelBuffer, x: i32, y: i32, color: Color, outline: Color) {
        for pass in [EDGE, FILL] {
            let paint = if pass == FILL { color } else { outline };
            for my in 0..self.rows {
                for mx in 0..self.stride {
                    if self.cells[my * self.stride + mx] == pass {
                        buf.set_pixel(x - 1 + mx as i32, y - 1 + my as i32, paint);
                    }
                }
            }
        }
    }
}

//! Overlay content as a list of draw operations.
//!
//! Builders describe what an overlay shows as a [`Frame`]. Two frames with
//! the same ops render the same pixels, so the frame hash doubles as the
//! content fingerprint that decides whether an overlay needs a redraw.

use std::hash::{DefaultHasher, Hash, Hasher};

use osd_render::{PixelBuffer, TextStyle, draw_glyph, draw_text};
use osd_types::color::Color;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DrawOp {
    Fill(Color),
    /// Copy the overlay's base image (icons) to the origin.
    Base,
    Rect {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        color: Color,
    },
    HLine {
        x1: i32,
        x2: i32,
        y: i32,
        color: Color,
    },
    Glyph {
        x: i32,
        y: i32,
        ch: char,
        color: Color,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        style: TextStyle,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    ops: Vec<DrawOp>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn text(&mut self, x: i32, y: i32, text: impl Into<String>, style: TextStyle) {
        self.push(DrawOp::Text {
            x,
            y,
            text: text.into(),
            style,
        });
    }

    pub fn glyph(&mut self, x: i32, y: i32, ch: char, color: Color) {
        self.push(DrawOp::Glyph { x, y, ch, color });
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Execute the ops in order. `Base` is skipped when there is no base.
    pub fn render(&self, buf: &mut PixelBuffer, base: Option<&PixelBuffer>) {
        for op in &self.ops {
            match op {
                DrawOp::Fill(color) => buf.fill(*color),
                DrawOp::Base => {
                    if let Some(base) = base {
                        buf.blit(base, 0, 0);
                    }
                }
                DrawOp::Rect { x, y, w, h, color } => buf.fill_rect(*x, *y, *w, *h, *color),
                DrawOp::HLine { x1, x2, y, color } => buf.hline(*x1, *x2, *y, *color),
                DrawOp::Glyph { x, y, ch, color } => {
                    draw_glyph(buf, *x, *y, *ch, *color);
                }
                DrawOp::Text { x, y, text, style } => {
                    draw_text(buf, *x, *y, text, style);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_frames_share_fingerprint() {
        let mut a = Frame::new();
        a.text(1, 2, "12:00:00", TextStyle::plain(Color::WHITE));
        let mut b = Frame::new();
        b.text(1, 2, "12:00:00", TextStyle::plain(Color::WHITE));
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = Frame::new();
        c.text(1, 2, "12:00:01", TextStyle::plain(Color::WHITE));
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn render_in_order() {
        let mut buf = PixelBuffer::try_new(16, 8).unwrap();
        let mut frame = Frame::new();
        frame.push(DrawOp::Fill(Color::BLACK));
        frame.push(DrawOp::Rect {
            x: 0,
            y: 0,
            w: 2,
            h: 2,
            color: Color::WHITE,
        });
        frame.push(DrawOp::HLine {
            x1: 0,
            x2: 15,
            y: 7,
            color: Color::WHITE,
        });
        frame.render(&mut buf, None);
        assert_eq!(buf.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(buf.pixel(5, 5), Some(Color::BLACK));
        assert_eq!(buf.pixel(15, 7), Some(Color::WHITE));
    }

    #[test]
    fn base_blitted_when_present() {
        let mut base = PixelBuffer::try_new(2, 2).unwrap();
        base.fill(Color::WHITE);
        let mut frame = Frame::new();
        frame.push(DrawOp::Base);

        let mut buf = PixelBuffer::try_new(2, 2).unwrap();
        frame.render(&mut buf, None);
        assert_eq!(buf.pixel(0, 0), Some(Color::TRANSPARENT));
        frame.render(&mut buf, Some(&base));
        assert_eq!(buf.pixel(1, 1), Some(Color::WHITE));
    }
}

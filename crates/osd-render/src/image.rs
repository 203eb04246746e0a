//! PNG loading for icon images and PNG export for debugging.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use osd_types::error::{OsdError, Result};

use crate::buffer::PixelBuffer;

/// Decode a PNG file into an RGBA buffer.
pub fn load_png(path: &Path) -> Result<PixelBuffer> {
    let file = File::open(path)
        .map_err(|e| OsdError::Image(format!("{}: {e}", path.display())))?;
    decode_png(BufReader::new(file)).map_err(|e| match e {
        OsdError::Image(msg) => OsdError::Image(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Decode PNG data from any reader. Every color type is widened to 8-bit RGBA.
pub fn decode_png<R: Read>(reader: R) -> Result<PixelBuffer> {
    let mut decoder = png::Decoder::new(reader);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| OsdError::Image(e.to_string()))?;

    let mut raw = Vec::new();
    raw.try_reserve_exact(reader.output_buffer_size())
        .map_err(|e| OsdError::ResourceExhausted(format!("png frame: {e}")))?;
    raw.resize(reader.output_buffer_size(), 0);
    let info = reader
        .next_frame(&mut raw)
        .map_err(|e| OsdError::Image(e.to_string()))?;
    let data = &raw[..info.buffer_size()];

    if info.bit_depth != png::BitDepth::Eight {
        return Err(OsdError::Image(format!(
            "unsupported bit depth {:?} after expansion",
            info.bit_depth
        )));
    }

    let rgba: Vec<u8> = match info.color_type {
        png::ColorType::Rgba => data.to_vec(),
        png::ColorType::Rgb => data
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => data
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Grayscale => data.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        png::ColorType::Indexed => {
            return Err(OsdError::Image("palette was not expanded".into()));
        }
    };
    PixelBuffer::from_rgba_bytes(info.width, info.height, &rgba)
}

/// Write a buffer as an 8-bit RGBA PNG.
pub fn export_png(buf: &PixelBuffer, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, buf.width(), buf.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| OsdError::Image(format!("{}: {e}", path.display())))?;
    writer
        .write_image_data(&buf.to_rgba_bytes())
        .map_err(|e| OsdError::Image(format!("{}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osd_types::color::Color;

    fn encode(width: u32, height: u32, color: png::ColorType, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        out
    }

    #[test]
    fn export_then_load_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut buf = PixelBuffer::try_new(3, 2).unwrap();
        buf.set_pixel(0, 0, Color::rgba(255, 0, 0, 128));
        buf.set_pixel(2, 1, Color::WHITE);

        export_png(&buf, &path).unwrap();
        let back = load_png(&path).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn rgb_gets_opaque_alpha() {
        let data = encode(2, 1, png::ColorType::Rgb, &[1, 2, 3, 4, 5, 6]);
        let buf = decode_png(data.as_slice()).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(Color::rgb(1, 2, 3)));
        assert_eq!(buf.pixel(1, 0), Some(Color::rgb(4, 5, 6)));
    }

    #[test]
    fn grayscale_alpha_expands() {
        let data = encode(1, 1, png::ColorType::GrayscaleAlpha, &[90, 40]);
        let buf = decode_png(data.as_slice()).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(Color::rgba(90, 90, 90, 40)));
    }

    #[test]
    fn missing_file_is_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_png(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, OsdError::Image(_)));
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn garbage_is_image_error() {
        let err = decode_png(&b"not a png"[..]).unwrap_err();
        assert!(matches!(err, OsdError::Image(_)));
    }
}

//! Frame sink writing composed overlays onto `/dev/fbN`.
//!
//! The framebuffer belongs to whatever else is on screen, so the sink only
//! touches the bounding box of the visible overlay pixels. The bytes under
//! that box are saved before blending. The next present folds them back into
//! the rows it rewrites, so the screen is restored when the overlays shrink
//! or disappear, and a row is never written twice per frame.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use osd_core::software::{FrameSink, blend_over};
use osd_render::PixelBuffer;
use osd_types::error::{OsdError, Result};

use crate::format::PixelFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbGeometry {
    pub width: u32,
    pub height: u32,
    /// Bytes per line.
    pub stride: usize,
    pub format: PixelFormat,
}

/// `virtual_size` content, e.g. `"640,480"`.
pub fn parse_virtual_size(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn read_sysfs(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    fs::read_to_string(&path).map_err(|e| OsdError::Display(format!("{}: {e}", path.display())))
}

impl FbGeometry {
    /// Read the geometry from a `/sys/class/graphics/fbN` directory. A
    /// missing `stride` falls back to the packed line length.
    pub fn query(sys_dir: &Path) -> Result<Self> {
        let size = read_sysfs(sys_dir, "virtual_size")?;
        let (width, height) = parse_virtual_size(&size)
            .ok_or_else(|| OsdError::Display(format!("bad virtual_size {:?}", size.trim())))?;
        let bpp = read_sysfs(sys_dir, "bits_per_pixel")?;
        let bpp: u32 = bpp
            .trim()
            .parse()
            .map_err(|_| OsdError::Display(format!("bad bits_per_pixel {:?}", bpp.trim())))?;
        let format = PixelFormat::from_bpp(bpp)?;
        let packed = width as usize * format.bytes_per_pixel();
        let stride = read_sysfs(sys_dir, "stride")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&s| s >= packed)
            .unwrap_or(packed);
        Ok(Self {
            width,
            height,
            stride,
            format,
        })
    }
}

/// A rectangle of framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Area {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Area {
    fn has_row(&self, y: u32) -> bool {
        y >= self.y && y - self.y < self.h
    }

    fn bottom(&self) -> u32 {
        self.y + self.h
    }

    fn right(&self) -> u32 {
        self.x + self.w
    }
}

/// Screen bytes under the last blended area.
#[derive(Debug)]
struct Underlay {
    area: Area,
    bytes: Vec<u8>,
}

impl Underlay {
    fn row(&self, y: u32, bpp: usize) -> &[u8] {
        let len = self.area.w as usize * bpp;
        let i = (y - self.area.y) as usize;
        &self.bytes[i * len..(i + 1) * len]
    }
}

/// Bounding box of the non-transparent pixels.
fn visible_bounds(frame: &PixelBuffer) -> Option<Area> {
    let width = frame.width() as usize;
    if width == 0 {
        return None;
    }
    let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0, 0);
    for (y, row) in frame.pixels().chunks_exact(width).enumerate() {
        let Some(first) = row.iter().position(|&px| px >> 24 != 0) else {
            continue;
        };
        let last = row.iter().rposition(|&px| px >> 24 != 0).unwrap_or(first);
        x0 = x0.min(first);
        x1 = x1.max(last);
        y0 = y0.min(y);
        y1 = y;
    }
    (y0 != usize::MAX).then(|| Area {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0 + 1) as u32,
        h: (y1 - y0 + 1) as u32,
    })
}

/// Framebuffer output. `D` is the device handle, `/dev/fbN` outside tests.
pub struct FbdevSink<D: FileExt = File> {
    file: D,
    device: PathBuf,
    geometry: FbGeometry,
    underlay: Option<Underlay>,
}

impl FbdevSink {
    /// Open `/dev/fb{number}`.
    pub fn open(number: u32) -> Result<Self> {
        Self::open_at(
            Path::new(&format!("/dev/fb{number}")),
            Path::new(&format!("/sys/class/graphics/fb{number}")),
        )
    }

    pub fn open_at(device: &Path, sys_dir: &Path) -> Result<Self> {
        let geometry = FbGeometry::query(sys_dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| OsdError::Display(format!("{}: {e}", device.display())))?;
        log::info!(
            "framebuffer {}: {}x{}, {:?}, stride {}",
            device.display(),
            geometry.width,
            geometry.height,
            geometry.format,
            geometry.stride
        );
        Ok(Self::with_device(file, device, geometry))
    }
}

impl<D: FileExt> FbdevSink<D> {
    /// Wrap an already opened device with a known geometry.
    pub fn with_device(file: D, device: impl Into<PathBuf>, geometry: FbGeometry) -> Self {
        Self {
            file,
            device: device.into(),
            geometry,
            underlay: None,
        }
    }

    pub fn geometry(&self) -> &FbGeometry {
        &self.geometry
    }

    fn offset(&self, x: u32, y: u32) -> u64 {
        (y as usize * self.geometry.stride + x as usize * self.geometry.format.bytes_per_pixel()) as u64
    }

    /// Write the saved underlay back.
    fn restore(&mut self) -> Result<()> {
        let Some(saved) = self.underlay.take() else {
            return Ok(());
        };
        let row_len = saved.area.w as usize * self.geometry.format.bytes_per_pixel();
        for (i, row) in saved.bytes.chunks_exact(row_len).enumerate() {
            self.file.write_all_at(row, self.offset(saved.area.x, saved.area.y + i as u32))?;
        }
        Ok(())
    }

    /// Visible frame bounds clipped to the screen.
    fn clipped_bounds(&self, frame: &PixelBuffer) -> Option<Area> {
        let area = visible_bounds(frame)?;
        let w = area.w.min(self.geometry.width.saturating_sub(area.x));
        let h = area.h.min(self.geometry.height.saturating_sub(area.y));
        (w > 0 && h > 0).then_some(Area { w, h, ..area })
    }
}

impl<D: FileExt> FrameSink for FbdevSink<D> {
    fn size(&self) -> (u32, u32) {
        (self.geometry.width, self.geometry.height)
    }

    /// Every row covered by the old or the new overlay is written exactly
    /// once: saved underlay outside the new area, blended pixels inside it.
    fn present(&mut self, frame: &PixelBuffer) -> Result<()> {
        let old = self.underlay.take();
        let new = self.clipped_bounds(frame);
        let areas: Vec<Area> = old.iter().map(|u| u.area).chain(new).collect();
        let (Some(top), Some(bottom)) = (
            areas.iter().map(|a| a.y).min(),
            areas.iter().map(Area::bottom).max(),
        ) else {
            return Ok(());
        };

        let format = self.geometry.format;
        let bpp = format.bytes_per_pixel();
        let mut saved = Vec::new();
        if let Some(area) = new {
            saved
                .try_reserve_exact(area.w as usize * bpp * area.h as usize)
                .map_err(|e| OsdError::ResourceExhausted(format!("framebuffer underlay: {e}")))?;
        }

        let pixels = frame.pixels();
        let frame_w = frame.width() as usize;
        let mut line = Vec::new();
        for y in top..bottom {
            let covering = areas.iter().filter(|a| a.has_row(y));
            let (Some(lo), Some(hi)) = (
                covering.clone().map(|a| a.x).min(),
                covering.map(Area::right).max(),
            ) else {
                continue;
            };
            line.clear();
            line.resize((hi - lo) as usize * bpp, 0);
            self.file.read_exact_at(&mut line, self.offset(lo, y))?;

            if let Some(under) = old.as_ref().filter(|u| u.area.has_row(y)) {
                let start = (under.area.x - lo) as usize * bpp;
                let row = under.row(y, bpp);
                line[start..start + row.len()].copy_from_slice(row);
            }
            if let Some(area) = new.filter(|a| a.has_row(y)) {
                let start = (area.x - lo) as usize * bpp;
                let span = &mut line[start..start + area.w as usize * bpp];
                saved.extend_from_slice(span);
                let src_row = y as usize * frame_w + area.x as usize;
                for (j, dst) in span.chunks_exact_mut(bpp).enumerate() {
                    let px = pixels[src_row + j];
                    if px >> 24 == 0 {
                        continue;
                    }
                    format.encode(blend_over(format.decode(dst), px), dst);
                }
            }
            self.file.write_all_at(&line, self.offset(lo, y))?;
        }

        self.underlay = new.map(|area| Underlay { area, bytes: saved });
        Ok(())
    }
}

impl<D: FileExt> Drop for FbdevSink<D> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            log::warn!("failed to restore {}: {e}", self.device.display());
        }
    }
}

//! Software compositor: keeps resources in memory and composes every element
//! into one display-sized frame on submit.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use osd_render::PixelBuffer;
use osd_render::image::export_png;
use osd_types::color::Color;
use osd_types::error::{OsdError, Result};

use crate::compositor::{
    Compositor, DisplayInfo, ElementHandle, ElementSpec, Rect, ResourceHandle, Update, UpdateOp,
};

/// Where composed frames end up.
pub trait FrameSink {
    /// Display size in pixels.
    fn size(&self) -> (u32, u32);

    /// Show a composed frame. Transparent pixels leave the display untouched.
    fn present(&mut self, frame: &PixelBuffer) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Headless sink
// ---------------------------------------------------------------------------

/// Keeps the last frame in memory, optionally writing it to `frame.png`.
#[derive(Debug)]
pub struct HeadlessSink {
    width: u32,
    height: u32,
    last: Option<PixelBuffer>,
    export_dir: Option<PathBuf>,
    presented: usize,
}

impl HeadlessSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            last: None,
            export_dir: None,
            presented: 0,
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn last_frame(&self) -> Option<&PixelBuffer> {
        self.last.as_ref()
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> usize {
        self.presented
    }
}

impl FrameSink for HeadlessSink {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &PixelBuffer) -> Result<()> {
        if let Some(dir) = &self.export_dir {
            export_png(frame, &dir.join("frame.png"))?;
        }
        match &mut self.last {
            Some(last) if last.width() == frame.width() && last.height() == frame.height() => {
                last.pixels_mut().copy_from_slice(frame.pixels());
            }
            slot => *slot = Some(frame.clone()),
        }
        self.presented += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compositor
// ---------------------------------------------------------------------------

pub struct SoftwareCompositor<S: FrameSink> {
    sink: S,
    frame: PixelBuffer,
    resources: BTreeMap<ResourceHandle, PixelBuffer>,
    elements: BTreeMap<ElementHandle, ElementSpec>,
    /// Handles added and not yet removed, including ones still pending in an
    /// unsubmitted update.
    issued: BTreeSet<ElementHandle>,
    next_resource: u32,
    next_element: u32,
    dirty: bool,
    submits: usize,
}

fn next_handle(counter: &mut u32) -> u32 {
    *counter = counter.wrapping_add(1).max(1);
    *counter
}

impl<S: FrameSink> SoftwareCompositor<S> {
    pub fn new(sink: S) -> Result<Self> {
        let (width, height) = sink.size();
        let frame = PixelBuffer::try_new(width, height)?;
        log::debug!("software compositor {width}x{height}");
        Ok(Self {
            sink,
            frame,
            resources: BTreeMap::new(),
            elements: BTreeMap::new(),
            issued: BTreeSet::new(),
            next_resource: 0,
            next_element: 0,
            dirty: false,
            submits: 0,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The last composed frame.
    pub fn frame(&self) -> &PixelBuffer {
        &self.frame
    }

    /// Submitted elements.
    pub fn element(&self, element: ElementHandle) -> Option<&ElementSpec> {
        self.elements.get(&element)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of `submit` calls so far.
    pub fn submits(&self) -> usize {
        self.submits
    }

    fn compose(&mut self) {
        let Self {
            frame,
            resources,
            elements,
            ..
        } = self;
        frame.fill(Color::TRANSPARENT);
        let mut order: Vec<(&ElementHandle, &ElementSpec)> = elements.iter().collect();
        order.sort_by_key(|(handle, spec)| (spec.layer, **handle));
        for (_, spec) in order {
            if let Some(src) = resources.get(&spec.resource) {
                draw_scaled(frame, src, spec.src, spec.dest);
            }
        }
    }
}

/// Source-over blend of two packed pixels with straight alpha.
pub fn blend_over(dst: u32, src: u32) -> u32 {
    let s = Color::from_packed(src);
    let d = Color::from_packed(dst);
    if s.a == 255 || d.a == 0 {
        return src;
    }
    if s.a == 0 {
        return dst;
    }
    let sa = u32::from(s.a);
    let da = u32::from(d.a) * (255 - sa) / 255;
    let out_a = sa + da;
    let mix = |sc: u8, dc: u8| ((u32::from(sc) * sa + u32::from(dc) * da) / out_a) as u8;
    Color::rgba(mix(s.r, d.r), mix(s.g, d.g), mix(s.b, d.b), out_a as u8).to_packed()
}

/// Nearest-neighbour scale `src_rect` of `src` onto `dest` of `frame`.
fn draw_scaled(frame: &mut PixelBuffer, src: &PixelBuffer, src_rect: Rect, dest: Rect) {
    if dest.is_empty() || src_rect.is_empty() {
        return;
    }
    let (fw, fh) = (i64::from(frame.width()), i64::from(frame.height()));
    let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));
    let dx0 = (-i64::from(dest.x)).max(0);
    let dx1 = (fw - i64::from(dest.x)).min(i64::from(dest.w));
    let dy0 = (-i64::from(dest.y)).max(0);
    let dy1 = (fh - i64::from(dest.y)).min(i64::from(dest.h));

    let src_px = src.pixels();
    let out = frame.pixels_mut();
    for dy in dy0..dy1 {
        let sy = i64::from(src_rect.y) + dy * i64::from(src_rect.h) / i64::from(dest.h);
        if sy < 0 || sy >= sh {
            continue;
        }
        let row = (i64::from(dest.y) + dy) * fw;
        for dx in dx0..dx1 {
            let sx = i64::from(src_rect.x) + dx * i64::from(src_rect.w) / i64::from(dest.w);
            if sx < 0 || sx >= sw {
                continue;
            }
            let i = (row + i64::from(dest.x) + dx) as usize;
            out[i] = blend_over(out[i], src_px[(sy * sw + sx) as usize]);
        }
    }
}

impl<S: FrameSink> Compositor for SoftwareCompositor<S> {
    fn display_info(&self) -> DisplayInfo {
        DisplayInfo {
            width: self.frame.width(),
            height: self.frame.height(),
        }
    }

    fn create_resource(&mut self, width: u32, height: u32) -> Result<ResourceHandle> {
        let buf = PixelBuffer::try_new(width, height)?;
        let handle = ResourceHandle(next_handle(&mut self.next_resource));
        self.resources.insert(handle, buf);
        Ok(handle)
    }

    fn write_resource(&mut self, resource: ResourceHandle, pixels: &PixelBuffer) -> Result<()> {
        let buf = self
            .resources
            .get_mut(&resource)
            .ok_or_else(|| OsdError::CompositorRejected(format!("unknown resource {}", resource.0)))?;
        if buf.width() != pixels.width() || buf.height() != pixels.height() {
            return Err(OsdError::CompositorRejected(format!(
                "resource {} is {}x{}, got {}x{}",
                resource.0,
                buf.width(),
                buf.height(),
                pixels.width(),
                pixels.height()
            )));
        }
        buf.pixels_mut().copy_from_slice(pixels.pixels());
        self.dirty |= self.elements.values().any(|e| e.resource == resource);
        Ok(())
    }

    fn delete_resource(&mut self, resource: ResourceHandle) -> Result<()> {
        self.resources
            .remove(&resource)
            .map(|_| ())
            .ok_or_else(|| OsdError::CompositorRejected(format!("unknown resource {}", resource.0)))
    }

    fn add_element(&mut self, update: &mut Update, spec: ElementSpec) -> Result<ElementHandle> {
        if !self.resources.contains_key(&spec.resource) {
            return Err(OsdError::CompositorRejected(format!(
                "element on unknown resource {}",
                spec.resource.0
            )));
        }
        let element = ElementHandle(next_handle(&mut self.next_element));
        self.issued.insert(element);
        update.push(UpdateOp::Add { element, spec });
        Ok(element)
    }

    fn modify_element(&mut self, update: &mut Update, element: ElementHandle, dest: Rect) -> Result<()> {
        if !self.issued.contains(&element) {
            return Err(OsdError::CompositorRejected(format!("modify of unknown element {}", element.0)));
        }
        update.push(UpdateOp::Modify { element, dest });
        Ok(())
    }

    fn remove_element(&mut self, update: &mut Update, element: ElementHandle) -> Result<()> {
        if !self.issued.remove(&element) {
            return Err(OsdError::CompositorRejected(format!("remove of unknown element {}", element.0)));
        }
        update.push(UpdateOp::Remove { element });
        Ok(())
    }

    fn submit(&mut self, update: Update) -> Result<()> {
        self.submits += 1;
        let changed = !update.is_empty();
        for op in update.into_ops() {
            match op {
                UpdateOp::Add { element, spec } => {
                    self.elements.insert(element, spec);
                }
                UpdateOp::Modify { element, dest } => {
                    if let Some(spec) = self.elements.get_mut(&element) {
                        spec.dest = dest;
                    }
                }
                UpdateOp::Remove { element } => {
                    self.elements.remove(&element);
                }
            }
        }
        if changed || self.dirty {
            self.compose();
            self.dirty = true;
            self.sink.present(&self.frame)?;
            self.dirty = false;
        }
        Ok(())
    }
}

//! Overlay slots: one per OSD or icon.
//!
//! A slot owns the overlay's buffer, compositor resource and element. The
//! buffer and resource are created on first use and kept for the lifetime
//! of the daemon; hiding an overlay only removes its element.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use osd_render::PixelBuffer;
use osd_render::image::export_png;
use osd_trigger::OverlayTarget;
use osd_types::error::Result;

use crate::compositor::{Compositor, ElementHandle, ElementSpec, Rect, ResourceHandle, Update};
use crate::content::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Full,
    Tiny,
    LowBattery,
    CpuTemp,
}

impl OverlayKind {
    /// Offset above the configured base layer.
    pub const fn layer_offset(self) -> i32 {
        match self {
            Self::Full => 1,
            Self::LowBattery | Self::CpuTemp => 2,
            Self::Tiny => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Full => "osd",
            Self::Tiny => "tiny osd",
            Self::LowBattery => "low battery icon",
            Self::CpuTemp => "cpu temperature icon",
        }
    }

    /// File name of the debug PNG export.
    pub const fn export_name(self) -> &'static str {
        match self {
            Self::Full => "full_osd.png",
            Self::Tiny => "tiny_osd.png",
            Self::LowBattery => "lowbatt_icon.png",
            Self::CpuTemp => "cputemp_icon.png",
        }
    }
}

impl From<OverlayTarget> for OverlayKind {
    fn from(target: OverlayTarget) -> Self {
        match target {
            OverlayTarget::Full => Self::Full,
            OverlayTarget::Tiny => Self::Tiny,
        }
    }
}

#[derive(Debug)]
pub struct OverlaySlot {
    kind: OverlayKind,
    layer: i32,
    width: u32,
    height: u32,
    /// `None` for icons, which follow their condition instead.
    timeout: Option<Duration>,
    activated: Option<Instant>,
    /// Image drawn under the content (icons).
    base: Option<PixelBuffer>,
    buffer: Option<PixelBuffer>,
    resource: ResourceHandle,
    element: ElementHandle,
    dest: Rect,
    /// Fingerprint of the frame currently in the resource.
    fingerprint: Option<u64>,
    export_dir: Option<PathBuf>,
}

impl OverlaySlot {
    pub fn new(kind: OverlayKind, base_layer: i32, width: u32, height: u32) -> Self {
        Self {
            kind,
            layer: base_layer.saturating_add(kind.layer_offset()),
            width,
            height,
            timeout: None,
            activated: None,
            base: None,
            buffer: None,
            resource: ResourceHandle::NONE,
            element: ElementHandle::NONE,
            dest: Rect::default(),
            fingerprint: None,
            export_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use `base` as the background image. The slot takes its size.
    pub fn with_base(mut self, base: PixelBuffer) -> Self {
        self.width = base.width();
        self.height = base.height();
        self.base = Some(base);
        self
    }

    pub fn with_export_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.export_dir = dir;
        self
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn base(&self) -> Option<&PixelBuffer> {
        self.base.as_ref()
    }

    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.buffer.as_ref()
    }

    pub fn element(&self) -> ElementHandle {
        self.element
    }

    pub fn dest(&self) -> Rect {
        self.dest
    }

    pub fn activated_at(&self) -> Option<Instant> {
        self.activated
    }

    pub fn is_active(&self) -> bool {
        self.activated.is_some()
    }

    /// Whether the overlay currently has an element on screen.
    pub fn is_live(&self) -> bool {
        !self.element.is_none()
    }

    /// Activate at `now`. An already active overlay keeps its first
    /// activation time. Returns whether this call activated it.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.activated.is_some() {
            return false;
        }
        self.activated = Some(now);
        log::debug!("{} activated", self.kind.name());
        true
    }

    /// Re-stamp the activation so the overlay never times out.
    pub fn force(&mut self, now: Instant) {
        self.activated = Some(now);
    }

    /// Hide and deactivate once more than the timeout has passed since
    /// activation. Returns whether the overlay expired.
    pub fn expire<C: Compositor>(&mut self, now: Instant, comp: &mut C, update: &mut Update) -> Result<bool> {
        let (Some(at), Some(timeout)) = (self.activated, self.timeout) else {
            return Ok(false);
        };
        if now.saturating_duration_since(at) <= timeout {
            return Ok(false);
        }
        self.activated = None;
        self.hide(comp, update)?;
        log::debug!("{} timed out", self.kind.name());
        Ok(true)
    }

    /// Remove the element, if any. Buffer and resource are kept.
    pub fn hide<C: Compositor>(&mut self, comp: &mut C, update: &mut Update) -> Result<()> {
        if self.element.is_none() {
            return Ok(());
        }
        let element = std::mem::replace(&mut self.element, ElementHandle::NONE);
        comp.remove_element(update, element)
    }

    /// Show `frame` at `dest`.
    ///
    /// The frame is rendered and written only when its fingerprint differs
    /// from the one in the resource. The element is added when not live,
    /// and modified when it moved or its content changed.
    pub fn present<C: Compositor>(
        &mut self,
        comp: &mut C,
        update: &mut Update,
        dest: Rect,
        frame: &Frame,
    ) -> Result<()> {
        let fingerprint = frame.fingerprint();
        let redraw = self.fingerprint != Some(fingerprint);
        if redraw {
            self.redraw(comp, frame)?;
            self.fingerprint = Some(fingerprint);
        }

        if self.element.is_none() {
            let spec = ElementSpec {
                layer: self.layer,
                dest,
                resource: self.resource,
                src: Rect::sized(self.width, self.height),
            };
            self.element = comp.add_element(update, spec)?;
            self.dest = dest;
        } else if redraw || dest != self.dest {
            comp.modify_element(update, self.element, dest)?;
            self.dest = dest;
        }
        Ok(())
    }

    fn redraw<C: Compositor>(&mut self, comp: &mut C, frame: &Frame) -> Result<()> {
        if self.resource.is_none() {
            self.resource = comp.create_resource(self.width, self.height)?;
        }
        if self.buffer.is_none() {
            self.buffer = Some(PixelBuffer::try_new(self.width, self.height)?);
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(());
        };
        frame.render(buffer, self.base.as_ref());
        comp.write_resource(self.resource, buffer)?;

        if let Some(dir) = &self.export_dir {
            let path = dir.join(self.kind.export_name());
            if let Err(e) = export_png(buffer, &path) {
                log::warn!("{} export to {}: {e}", self.kind.name(), path.display());
            }
        }
        Ok(())
    }

    /// Deactivate and remove the element into `update`.
    pub fn release<C: Compositor>(&mut self, comp: &mut C, update: &mut Update) -> Result<()> {
        self.activated = None;
        self.hide(comp, update)
    }

    /// Free the compositor resource. Only valid once the element removal
    /// has been submitted.
    pub fn delete_resource<C: Compositor>(&mut self, comp: &mut C) -> Result<()> {
        if self.resource.is_none() {
            return Ok(());
        }
        let resource = std::mem::replace(&mut self.resource, ResourceHandle::NONE);
        self.fingerprint = None;
        comp.delete_resource(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::DrawOp;
    use crate::software::{HeadlessSink, SoftwareCompositor};
    use osd_render::TextStyle;
    use osd_types::color::Color;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn compositor() -> SoftwareCompositor<HeadlessSink> {
        SoftwareCompositor::new(HeadlessSink::new(64, 32)).unwrap()
    }

    fn frame(text: &str) -> Frame {
        let mut f = Frame::new();
        f.push(DrawOp::Fill(Color::BLACK));
        f.text(0, 0, text, TextStyle::plain(Color::WHITE));
        f
    }

    fn slot(kind: OverlayKind) -> OverlaySlot {
        OverlaySlot::new(kind, 100, 32, 8).with_timeout(TIMEOUT)
    }

    #[test]
    fn layers_follow_kind() {
        assert_eq!(slot(OverlayKind::Full).layer(), 101);
        assert_eq!(slot(OverlayKind::LowBattery).layer(), 102);
        assert_eq!(slot(OverlayKind::CpuTemp).layer(), 102);
        assert_eq!(slot(OverlayKind::Tiny).layer(), 103);
        assert_eq!(OverlayKind::from(OverlayTarget::Tiny), OverlayKind::Tiny);
    }

    #[test]
    fn first_trigger_wins() {
        let t0 = Instant::now();
        let mut s = slot(OverlayKind::Full);
        assert!(s.trigger(t0));
        assert!(!s.trigger(t0 + Duration::from_secs(2)));
        assert_eq!(s.activated_at(), Some(t0));
    }

    #[test]
    fn expires_strictly_after_timeout() {
        let t0 = Instant::now();
        let mut comp = compositor();
        let mut s = slot(OverlayKind::Full);
        s.trigger(t0);
        let mut update = Update::new();
        assert!(!s.expire(t0 + TIMEOUT, &mut comp, &mut update).unwrap());
        assert!(s.is_active());
        assert!(s.expire(t0 + TIMEOUT + Duration::from_millis(1), &mut comp, &mut update).unwrap());
        assert!(!s.is_active());
    }

    #[test]
    fn redraws_only_on_new_content() {
        let mut comp = compositor();
        let mut s = slot(OverlayKind::Tiny);
        let dest = Rect::new(0, 0, 64, 16);

        let mut update = Update::new();
        s.present(&mut comp, &mut update, dest, &frame("a")).unwrap();
        assert_eq!(update.len(), 1);
        comp.submit(update).unwrap();
        assert!(s.is_live());
        assert_eq!(comp.resource_count(), 1);

        // Same content, same place: nothing to do.
        let mut update = Update::new();
        s.present(&mut comp, &mut update, dest, &frame("a")).unwrap();
        assert!(update.is_empty());

        // New content is pushed as a modify.
        let mut update = Update::new();
        s.present(&mut comp, &mut update, dest, &frame("b")).unwrap();
        assert_eq!(update.len(), 1);
        comp.submit(update).unwrap();

        // Moving without new content also modifies.
        let mut update = Update::new();
        s.present(&mut comp, &mut update, Rect::new(0, 16, 64, 16), &frame("b")).unwrap();
        assert_eq!(update.len(), 1);
        comp.submit(update).unwrap();
        assert_eq!(comp.element(s.element()).map(|e| e.dest.y), Some(16));
    }

    #[test]
    fn back_to_back_timeouts_keep_buffers() {
        let t0 = Instant::now();
        let mut comp = compositor();
        let mut full = slot(OverlayKind::Full);
        let mut tiny = slot(OverlayKind::Tiny);
        let dest = Rect::new(0, 0, 64, 16);

        let mut update = Update::new();
        full.trigger(t0);
        tiny.trigger(t0);
        full.present(&mut comp, &mut update, dest, &frame("full")).unwrap();
        tiny.present(&mut comp, &mut update, dest, &frame("tiny")).unwrap();
        comp.submit(update).unwrap();
        assert_eq!(comp.element_count(), 2);

        let later = t0 + TIMEOUT * 2;
        let mut update = Update::new();
        assert!(full.expire(later, &mut comp, &mut update).unwrap());
        assert!(tiny.expire(later, &mut comp, &mut update).unwrap());
        comp.submit(update).unwrap();

        assert_eq!(comp.element_count(), 0);
        assert!(!full.is_live() && !tiny.is_live());
        assert!(full.buffer().is_some() && tiny.buffer().is_some());
        assert_eq!(comp.resource_count(), 2);
    }

    #[test]
    fn reshow_after_hide_reuses_resource() {
        let mut comp = compositor();
        let mut s = slot(OverlayKind::CpuTemp);
        let dest = Rect::new(0, 0, 32, 8);

        let mut update = Update::new();
        s.present(&mut comp, &mut update, dest, &frame("x")).unwrap();
        s.hide(&mut comp, &mut update).unwrap();
        s.present(&mut comp, &mut update, dest, &frame("x")).unwrap();
        comp.submit(update).unwrap();
        assert_eq!(comp.resource_count(), 1);
        assert_eq!(comp.element_count(), 1);
    }

    #[test]
    fn base_sets_size_and_shows_under_content() {
        let mut base = PixelBuffer::try_new(4, 2).unwrap();
        base.fill(Color::WHITE);
        let mut s = OverlaySlot::new(OverlayKind::LowBattery, 0, 1, 1).with_base(base);
        assert_eq!(s.size(), (4, 2));

        let mut comp = compositor();
        let mut update = Update::new();
        let mut f = Frame::new();
        f.push(DrawOp::Base);
        s.present(&mut comp, &mut update, Rect::new(0, 0, 4, 2), &f).unwrap();
        assert_eq!(s.buffer().and_then(|b| b.pixel(3, 1)), Some(Color::WHITE));
    }

    #[test]
    fn export_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut comp = compositor();
        let mut s = slot(OverlayKind::Full).with_export_dir(Some(dir.path().to_path_buf()));
        let mut update = Update::new();
        s.present(&mut comp, &mut update, Rect::new(0, 0, 32, 8), &frame("png")).unwrap();
        assert!(dir.path().join("full_osd.png").exists());
    }

    #[test]
    fn release_then_delete() {
        let t0 = Instant::now();
        let mut comp = compositor();
        let mut s = slot(OverlayKind::Full);
        s.trigger(t0);
        let mut update = Update::new();
        s.present(&mut comp, &mut update, Rect::new(0, 0, 32, 8), &frame("a")).unwrap();
        comp.submit(update).unwrap();

        let mut update = Update::new();
        s.release(&mut comp, &mut update).unwrap();
        comp.submit(update).unwrap();
        s.delete_resource(&mut comp).unwrap();
        // Second teardown is a no-op.
        s.delete_resource(&mut comp).unwrap();
        assert!(!s.is_active());
        assert_eq!(comp.resource_count(), 0);
        assert_eq!(comp.element_count(), 0);
    }
}

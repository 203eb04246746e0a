//! Retained-mode compositor interface.
//!
//! Overlays own a pixel resource each and place it on screen as an element.
//! Element changes are batched into an [`Update`] and applied atomically by
//! [`Compositor::submit`], so a tick never shows a half-updated screen.

use osd_render::PixelBuffer;
use osd_types::error::Result;

/// A rectangle in display or resource pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Whole-resource source rect.
    pub const fn sized(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Handle to a pixel resource. Zero means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ResourceHandle(pub u32);

impl ResourceHandle {
    pub const NONE: Self = Self(0);

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Handle to an on-screen element. Zero means not composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ElementHandle(pub u32);

impl ElementHandle {
    pub const NONE: Self = Self(0);

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub width: u32,
    pub height: u32,
}

/// Placement of a resource on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpec {
    /// Higher layers draw on top.
    pub layer: i32,
    /// Destination in display pixels. The source is scaled to fit.
    pub dest: Rect,
    pub resource: ResourceHandle,
    /// Source region in resource pixels.
    pub src: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Add {
        element: ElementHandle,
        spec: ElementSpec,
    },
    Modify {
        element: ElementHandle,
        dest: Rect,
    },
    Remove {
        element: ElementHandle,
    },
}

/// Element changes collected during one tick.
#[derive(Debug, Default)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: UpdateOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<UpdateOp> {
        self.ops
    }
}

/// A display compositor with retained resources and elements.
///
/// Handles returned by `create_resource` and `add_element` are never zero.
/// Callers only modify or remove elements they added and have not removed;
/// anything else is rejected with `CompositorRejected`.
pub trait Compositor {
    fn display_info(&self) -> DisplayInfo;

    fn create_resource(&mut self, width: u32, height: u32) -> Result<ResourceHandle>;

    /// Replace the resource content. `pixels` must match the resource size.
    fn write_resource(&mut self, resource: ResourceHandle, pixels: &PixelBuffer) -> Result<()>;

    fn delete_resource(&mut self, resource: ResourceHandle) -> Result<()>;

    fn add_element(&mut self, update: &mut Update, spec: ElementSpec) -> Result<ElementHandle>;

    fn modify_element(&mut self, update: &mut Update, element: ElementHandle, dest: Rect) -> Result<()>;

    fn remove_element(&mut self, update: &mut Update, element: ElementHandle) -> Result<()>;

    /// Apply every op of `update` at once.
    fn submit(&mut self, update: Update) -> Result<()>;
}

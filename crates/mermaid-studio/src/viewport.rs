//! Pan/zoom viewport over the displayed artifact
//!
//! The viewport never touches the artifact itself; it only owns the affine
//! transform applied to it. The transform composes as
//! `translate(offset) scale(scale)` with the scale origin at the artifact's
//! top-left corner.
//!
//! Wheel zoom is additive and button zoom is multiplicative, but both clamp
//! to the same `[MIN_SCALE, MAX_SCALE]` range.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Smallest allowed scale
pub const MIN_SCALE: f64 = 0.1;

/// Largest allowed scale
pub const MAX_SCALE: f64 = 5.0;

/// Scale change per unit of wheel delta
pub const WHEEL_SENSITIVITY: f64 = 0.001;

/// Multiplier applied by the zoom buttons
pub const ZOOM_STEP: f64 = 1.2;

/// Offset and scale applied to the displayed artifact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl ViewportTransform {
    /// The transform every successful render starts from
    pub const IDENTITY: ViewportTransform = ViewportTransform {
        offset_x: 0.0,
        offset_y: 0.0,
        scale: 1.0,
    };

    /// CSS `transform` value for the artifact container
    pub fn css(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            self.offset_x, self.offset_y, self.scale
        )
    }

    /// Map a point in artifact coordinates to the surface
    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }

    /// Map a surface point back into artifact coordinates
    pub fn to_content(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.offset_x) / self.scale,
            (y - self.offset_y) / self.scale,
        )
    }
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// An open pointer drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Pointer position minus the offset at drag start
    pub anchor_x: f64,
    pub anchor_y: f64,
}

fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Interactive pan/zoom state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Viewport {
    transform: ViewportTransform,
    drag: Option<DragSession>,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn scale(&self) -> f64 {
        self.transform.scale
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_session(&self) -> Option<DragSession> {
        self.drag
    }

    /// Begin a drag at the given pointer position
    ///
    /// Starting again while a drag is open re-anchors it. Non-finite
    /// positions are ignored.
    pub fn on_drag_start(&mut self, pointer_x: f64, pointer_y: f64) {
        if !(pointer_x.is_finite() && pointer_y.is_finite()) {
            return;
        }
        self.drag = Some(DragSession {
            anchor_x: pointer_x - self.transform.offset_x,
            anchor_y: pointer_y - self.transform.offset_y,
        });
    }

    /// Move the open drag; ignored when no drag is open
    pub fn on_drag_move(&mut self, pointer_x: f64, pointer_y: f64) {
        let Some(drag) = self.drag else {
            return;
        };
        if !(pointer_x.is_finite() && pointer_y.is_finite()) {
            return;
        }
        self.transform.offset_x = pointer_x - drag.anchor_x;
        self.transform.offset_y = pointer_y - drag.anchor_y;
    }

    /// Close the drag (pointer released)
    pub fn on_drag_end(&mut self) {
        self.drag = None;
    }

    /// Close the drag (pointer left the surface)
    pub fn on_pointer_leave(&mut self) {
        self.on_drag_end();
    }

    /// Additive zoom from a wheel event; positive deltas zoom out
    pub fn on_wheel(&mut self, delta_y: f64) {
        if !delta_y.is_finite() {
            return;
        }
        self.transform.scale = clamp_scale(self.transform.scale - delta_y * WHEEL_SENSITIVITY);
        trace!(scale = self.transform.scale, "Wheel zoom");
    }

    /// Multiplicative zoom in by [`ZOOM_STEP`]
    pub fn zoom_in(&mut self) {
        self.transform.scale = clamp_scale(self.transform.scale * ZOOM_STEP);
    }

    /// Multiplicative zoom out by [`ZOOM_STEP`]
    pub fn zoom_out(&mut self) {
        self.transform.scale = clamp_scale(self.transform.scale / ZOOM_STEP);
    }

    /// Back to `{0, 0, 1.0}`
    ///
    /// An open drag is kept and re-anchored at the current pointer, so it
    /// keeps panning from the new origin.
    pub fn reset(&mut self) {
        if let Some(drag) = self.drag.as_mut() {
            drag.anchor_x += self.transform.offset_x;
            drag.anchor_y += self.transform.offset_y;
        }
        self.transform = ViewportTransform::IDENTITY;
    }
}

//! Coordinate transformation between pointer, canvas and original-image space.

use crate::types::{Coordinates, Point, SelectionBox};
use serde::{Deserialize, Serialize};

/// Pointer position in client (viewport) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub client_x: f64,
    pub client_y: f64,
}

impl PointerEvent {
    #[must_use]
    pub fn new(client_x: f64, client_y: f64) -> Self {
        Self { client_x, client_y }
    }
}

/// Canvas backing-store size plus its on-screen bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasLayout {
    /// Backing-store width in canvas pixels
    pub width: u32,
    /// Backing-store height in canvas pixels
    pub height: u32,
    pub rect_left: f64,
    pub rect_top: f64,
    pub rect_width: f64,
    pub rect_height: f64,
}

impl CanvasLayout {
    /// Layout whose CSS size equals its backing-store size
    #[must_use]
    pub fn unscaled(width: u32, height: u32, rect_left: f64, rect_top: f64) -> Self {
        Self {
            width,
            height,
            rect_left,
            rect_top,
            rect_width: f64::from(width),
            rect_height: f64::from(height),
        }
    }
}

/// Maps a pointer event into canvas space, clamped to the canvas.
///
/// Returns the origin when there is no canvas to map against.
#[must_use]
pub fn canvas_point(event: PointerEvent, layout: Option<&CanvasLayout>) -> Point {
    let Some(layout) = layout else {
        return Point::ZERO;
    };
    if layout.rect_width <= 0.0 || layout.rect_height <= 0.0 {
        return Point::ZERO;
    }

    let width = f64::from(layout.width);
    let height = f64::from(layout.height);
    let x = (event.client_x - layout.rect_left) * (width / layout.rect_width);
    let y = (event.client_y - layout.rect_top) * (height / layout.rect_height);

    Point::new(x.clamp(0.0, width), y.clamp(0.0, height))
}

/// Ratio between the natural image size and its displayed size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageScale {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for ImageScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ImageScale {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
    };

    /// Scale from natural (decoded) and displayed sizes.
    /// A zero displayed dimension leaves that axis at 1.0.
    #[must_use]
    pub fn from_sizes(natural: (u32, u32), displayed: (u32, u32)) -> Self {
        let axis = |n: u32, d: u32| {
            if d == 0 {
                1.0
            } else {
                f64::from(n) / f64::from(d)
            }
        };
        Self {
            scale_x: axis(natural.0, displayed.0),
            scale_y: axis(natural.1, displayed.1),
        }
    }

    /// Canvas-space rectangle to original-image pixels, rounded to nearest
    #[must_use]
    pub fn canvas_to_image(&self, selection: &SelectionBox) -> Coordinates {
        Coordinates {
            x: round_px(selection.x * self.scale_x),
            y: round_px(selection.y * self.scale_y),
            width: round_px(selection.width * self.scale_x),
            height: round_px(selection.height * self.scale_y),
        }
    }

    /// Original-image rectangle back to canvas space
    #[must_use]
    pub fn image_to_canvas(&self, coords: &Coordinates) -> SelectionBox {
        SelectionBox::new(
            f64::from(coords.x) / self.scale_x,
            f64::from(coords.y) / self.scale_y,
            f64::from(coords.width) / self.scale_x,
            f64::from(coords.height) / self.scale_y,
        )
    }

    /// Selection size in original-image pixels, `"{w}×{h}px"`
    #[must_use]
    pub fn dimension_label(&self, selection: &SelectionBox) -> String {
        let coords = self.canvas_to_image(selection);
        format!("{}×{}px", coords.width, coords.height)
    }
}

fn round_px(value: f64) -> u32 {
    if value.is_finite() {
        value.round().clamp(0.0, f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

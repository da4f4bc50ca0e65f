//! Mask/box compositing
//!
//! Merges the edge map into the detected mask and turns the session state into
//! an overlay: an optional RGBA buffer (contour or filled mask) plus vector
//! shapes for selection rectangles and labels. [`compose_overlay`] is pure;
//! [`blit`] is the only step that touches a drawing surface.

use crate::config::ViewMode;
use crate::detection::edges::is_edge;
use crate::mapping::ImageScale;
use crate::types::{ObjectMask, SelectionBox};
use image::{Rgba, RgbaImage};

/// Contour pixels and the live drag rectangle stroke (`#44ff44`)
pub const CONTOUR_COLOR: Rgba<u8> = Rgba([0x44, 0xff, 0x44, 255]);
/// Live drag rectangle fill, `rgba(68, 255, 68, 0.15)`
pub const LIVE_FILL: Rgba<u8> = Rgba([68, 255, 68, 38]);
/// Committed selection stroke and label background (`#007bff`)
pub const SELECTION_COLOR: Rgba<u8> = Rgba([0, 123, 255, 255]);
/// Committed selection fill, `rgba(0, 123, 255, 0.1)`
pub const SELECTION_FILL: Rgba<u8> = Rgba([0, 123, 255, 26]);
/// Label text color
pub const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Stroke width for every rectangle
pub const LINE_WIDTH: f64 = 2.0;
/// Approximate advance of one glyph in the 12 px label font
pub const APPROX_CHAR_WIDTH: f64 = 7.0;

/// Live boxes must exceed this size before the dimension readout is drawn
const READOUT_MIN_WIDTH: f64 = 50.0;
const READOUT_MIN_HEIGHT: f64 = 20.0;

/// Raise the alpha of every masked pixel that lies on an edge to at least
/// [`ObjectMask::EDGE_ALPHA`]. Unmasked pixels are left alone.
pub fn merge_edges(mask: &mut RgbaImage, edges: &RgbaImage) {
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        if pixel[3] > 0 && is_edge(edges, x, y) {
            pixel[3] = pixel[3].max(ObjectMask::EDGE_ALPHA);
        }
    }
}

/// A masked pixel with a transparent 8-neighbor, or sitting on the buffer edge
#[must_use]
pub fn is_contour_pixel(mask: &RgbaImage, x: u32, y: u32) -> bool {
    let (width, height) = mask.dimensions();
    if x >= width || y >= height || mask.get_pixel(x, y)[3] == 0 {
        return false;
    }
    if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
        return true;
    }
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) != (x, y) && mask.get_pixel(nx, ny)[3] == 0 {
                return true;
            }
        }
    }
    false
}

/// Every contour pixel in row-major order
#[must_use]
pub fn contour_pixels(mask: &RgbaImage) -> Vec<(u32, u32)> {
    let (width, height) = mask.dimensions();
    let mut pixels = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if is_contour_pixel(mask, x, y) {
                pixels.push((x, y));
            }
        }
    }
    pixels
}

/// Transparent buffer with only the contour painted in [`CONTOUR_COLOR`]
#[must_use]
pub fn contour_image(mask: &RgbaImage) -> RgbaImage {
    let (width, height) = mask.dimensions();
    let mut out = RgbaImage::new(width, height);
    for (x, y) in contour_pixels(mask) {
        out.put_pixel(x, y, CONTOUR_COLOR);
    }
    out
}

/// Rough width of `text` in the label font
#[must_use]
pub fn measure_text(text: &str) -> f64 {
    text.chars().count() as f64 * APPROX_CHAR_WIDTH
}

/// Vector primitive drawn over the mask buffer
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba<u8>,
    },
    StrokeRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba<u8>,
        line_width: f64,
    },
    /// Text anchored at its baseline start
    Text {
        text: String,
        x: f64,
        y: f64,
        color: Rgba<u8>,
    },
}

/// Everything needed to draw one frame of the preview
#[derive(Debug, Clone, Copy)]
pub struct OverlayState<'a> {
    pub width: u32,
    pub height: u32,
    pub mask: Option<&'a ObjectMask>,
    pub view_mode: ViewMode,
    pub committed: &'a [SelectionBox],
    /// Box being dragged right now
    pub live_box: Option<SelectionBox>,
    pub scale: ImageScale,
}

/// One composed frame
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub width: u32,
    pub height: u32,
    /// Raster layer placed at the origin, if a mask is shown
    pub buffer: Option<RgbaImage>,
    pub shapes: Vec<OverlayShape>,
}

impl Overlay {
    /// Text of every label shape in draw order
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.shapes
            .iter()
            .filter_map(|shape| match shape {
                OverlayShape::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn push_box(
    shapes: &mut Vec<OverlayShape>,
    selection: &SelectionBox,
    stroke: Rgba<u8>,
    fill: Rgba<u8>,
) {
    shapes.push(OverlayShape::FillRect {
        x: selection.x,
        y: selection.y,
        width: selection.width,
        height: selection.height,
        color: fill,
    });
    shapes.push(OverlayShape::StrokeRect {
        x: selection.x,
        y: selection.y,
        width: selection.width,
        height: selection.height,
        color: stroke,
        line_width: LINE_WIDTH,
    });
}

/// Build the overlay for `state`.
///
/// Draw order: mask layer, committed selections with their labels, then the
/// live drag box. The live box is hidden while a mask is on screen.
#[must_use]
pub fn compose_overlay(state: &OverlayState<'_>) -> Overlay {
    let buffer = state.mask.map(|mask| match state.view_mode {
        ViewMode::Contour => contour_image(mask.as_image()),
        ViewMode::Box => mask.as_image().clone(),
    });

    let mut shapes = Vec::new();

    for (index, selection) in state.committed.iter().enumerate() {
        push_box(&mut shapes, selection, SELECTION_COLOR, SELECTION_FILL);

        let label = format!("Selection {}", index + 1);
        shapes.push(OverlayShape::FillRect {
            x: selection.x,
            y: selection.y - 20.0,
            width: measure_text(&label) + 8.0,
            height: 18.0,
            color: SELECTION_COLOR,
        });
        shapes.push(OverlayShape::Text {
            text: label,
            x: selection.x + 4.0,
            y: selection.y - 6.0,
            color: LABEL_TEXT_COLOR,
        });
    }

    if let (Some(live), None) = (state.live_box, state.mask) {
        push_box(&mut shapes, &live, CONTOUR_COLOR, LIVE_FILL);

        if live.width > READOUT_MIN_WIDTH && live.height > READOUT_MIN_HEIGHT {
            let readout = state.scale.dimension_label(&live);
            let text_width = measure_text(&readout);
            let right = live.x + live.width;
            let bottom = live.y + live.height;
            shapes.push(OverlayShape::FillRect {
                x: right - text_width - 8.0,
                y: bottom - 18.0,
                width: text_width + 8.0,
                height: 16.0,
                color: CONTOUR_COLOR,
            });
            shapes.push(OverlayShape::Text {
                text: readout,
                x: right - text_width - 4.0,
                y: bottom - 4.0,
                color: LABEL_TEXT_COLOR,
            });
        }
    }

    Overlay {
        width: state.width,
        height: state.height,
        buffer,
        shapes,
    }
}

/// Minimal 2D drawing context the overlay is blitted onto
pub trait CanvasSurface {
    fn clear(&mut self);
    /// Replace pixels starting at `(x, y)` without blending
    fn put_image_data(&mut self, data: &RgbaImage, x: u32, y: u32);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgba<u8>);
    fn stroke_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba<u8>,
        line_width: f64,
    );
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgba<u8>);
}

/// Clear `surface` and draw `overlay` onto it
pub fn blit<S: CanvasSurface + ?Sized>(overlay: &Overlay, surface: &mut S) {
    surface.clear();
    if let Some(buffer) = &overlay.buffer {
        surface.put_image_data(buffer, 0, 0);
    }
    for shape in &overlay.shapes {
        match shape {
            OverlayShape::FillRect {
                x,
                y,
                width,
                height,
                color,
            } => surface.fill_rect(*x, *y, *width, *height, *color),
            OverlayShape::StrokeRect {
                x,
                y,
                width,
                height,
                color,
                line_width,
            } => surface.stroke_rect(*x, *y, *width, *height, *color, *line_width),
            OverlayShape::Text { text, x, y, color } => surface.fill_text(text, *x, *y, *color),
        }
    }
}

/// Text drawn on a [`RasterSurface`]; glyphs are not rasterized
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: Rgba<u8>,
}

/// Software [`CanvasSurface`] over an `RgbaImage` using source-over blending
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
    texts: Vec<TextRun>,
}

impl RasterSurface {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            texts: Vec::new(),
        }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    #[must_use]
    pub fn texts(&self) -> &[TextRun] {
        &self.texts
    }

    /// Pixel span covered by `[start, start + len)`, with pixel centers as the sample point
    fn span(start: f64, len: f64, max: u32) -> (u32, u32) {
        let clip = |v: f64| (v - 0.5).ceil().clamp(0.0, f64::from(max)) as u32;
        (clip(start), clip(start + len))
    }
}

/// Source-over composite of `top` onto `base`
#[must_use]
pub fn source_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let top_a = f32::from(top[3]) / 255.0;
    let base_a = f32::from(base[3]) / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| {
        let v = (f32::from(t) * top_a + f32::from(b) * base_a * (1.0 - top_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Composite `layer` over `background`; the layer is anchored at the origin
#[must_use]
pub fn flatten_onto(background: &RgbaImage, layer: &RgbaImage) -> RgbaImage {
    let mut out = background.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if let Some(top) = layer.get_pixel_checked(x, y) {
            *pixel = source_over(*pixel, *top);
        }
    }
    out
}

impl CanvasSurface for RasterSurface {
    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.texts.clear();
    }

    fn put_image_data(&mut self, data: &RgbaImage, x: u32, y: u32) {
        let (width, height) = self.image.dimensions();
        for (dx, dy, pixel) in data.enumerate_pixels() {
            let (tx, ty) = (x.saturating_add(dx), y.saturating_add(dy));
            if tx < width && ty < height {
                self.image.put_pixel(tx, ty, *pixel);
            }
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgba<u8>) {
        let (img_w, img_h) = self.image.dimensions();
        let (x0, x1) = Self::span(x, width, img_w);
        let (y0, y1) = Self::span(y, height, img_h);
        for py in y0..y1 {
            for px in x0..x1 {
                let base = *self.image.get_pixel(px, py);
                self.image.put_pixel(px, py, source_over(base, color));
            }
        }
    }

    fn stroke_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba<u8>,
        line_width: f64,
    ) {
        let half = line_width / 2.0;
        // Top and bottom run the full outer width; sides fill the gap between them
        self.fill_rect(x - half, y - half, width + line_width, line_width, color);
        self.fill_rect(x - half, y + height - half, width + line_width, line_width, color);
        self.fill_rect(x - half, y + half, line_width, height - line_width, color);
        self.fill_rect(x + width - half, y + half, line_width, height - line_width, color);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgba<u8>) {
        self.texts.push(TextRun {
            text: text.to_string(),
            x,
            y,
            color,
        });
    }
}

//! Core types for mask preview operations

use crate::error::{MaskError, Result};
use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A point in canvas-pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// User-drawn selection rectangle in canvas-pixel space
///
/// Width and height are always non-negative; a drag in any direction is
/// normalized through [`SelectionBox::from_corners`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionBox {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from the drag origin and the current pointer position
    #[must_use]
    pub fn from_corners(start: Point, current: Point) -> Self {
        let dx = current.x - start.x;
        let dy = current.y - start.y;
        Self {
            x: if dx < 0.0 { current.x } else { start.x },
            y: if dy < 0.0 { current.y } else { start.y },
            width: dx.abs(),
            height: dy.abs(),
        }
    }

    /// Whether both sides reach `min_side` canvas pixels
    #[must_use]
    pub fn meets_minimum(&self, min_side: f64) -> bool {
        self.width >= min_side && self.height >= min_side
    }

    /// Flood fill seed: the box center, floored to whole pixels
    #[must_use]
    pub fn seed(&self) -> (i64, i64) {
        (
            (self.x + self.width / 2.0).floor() as i64,
            (self.y + self.height / 2.0).floor() as i64,
        )
    }

    /// Whether pixel `(px, py)` lies inside the box (`x <= px < x + width`)
    #[must_use]
    pub fn contains_pixel(&self, px: u32, py: u32) -> bool {
        let (fx, fy) = (f64::from(px), f64::from(py));
        fx >= self.x && fx < self.x + self.width && fy >= self.y && fy < self.y + self.height
    }

    /// Integer pixel bounds covered by this box, clipped to an image of the given size
    #[must_use]
    pub fn pixel_bounds(&self, image_width: u32, image_height: u32) -> PixelBounds {
        let clip = |v: f64, max: u32| -> u32 { v.ceil().clamp(0.0, f64::from(max)) as u32 };
        PixelBounds {
            x0: clip(self.x, image_width),
            y0: clip(self.y, image_height),
            x1: clip(self.x + self.width, image_width),
            y1: clip(self.y + self.height, image_height),
        }
    }
}

/// Half-open integer pixel rectangle `[x0, x1) × [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBounds {
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= i64::from(self.x0)
            && x < i64::from(self.x1)
            && y >= i64::from(self.y0)
            && y < i64::from(self.y1)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}

/// Rectangle in original-image pixel space, as sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Wire form of a mask inside the job request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskPayload {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 bytes
    pub data: Vec<u8>,
}

impl From<ObjectMask> for MaskPayload {
    fn from(mask: ObjectMask) -> Self {
        let (width, height) = mask.dimensions();
        Self {
            width,
            height,
            data: mask.into_image().into_raw(),
        }
    }
}

impl TryFrom<MaskPayload> for ObjectMask {
    type Error = MaskError;

    fn try_from(payload: MaskPayload) -> Result<Self> {
        Self::from_raw(payload.width, payload.height, payload.data)
    }
}

/// Detected object mask aligned to canvas pixel space
///
/// Alpha encodes membership: 0 is outside the object, 150 is a flood-filled
/// pixel, 200 and above marks an edge-reinforced boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MaskPayload", try_from = "MaskPayload")]
pub struct ObjectMask {
    image: RgbaImage,
}

impl ObjectMask {
    /// Alpha written by the flood fill for included pixels
    pub const FILL_ALPHA: u8 = 150;
    /// Minimum alpha of a masked pixel that sits on a detected edge
    pub const EDGE_ALPHA: u8 = 200;

    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Rebuild a mask from raw RGBA bytes
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        RgbaImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                MaskError::invalid_config(format!(
                    "Mask buffer does not match {}x{} RGBA dimensions",
                    width, height
                ))
            })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Alpha at `(x, y)`, or 0 outside the buffer
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel_checked(x, y).map_or(0, |p| p[3])
    }

    /// Whether no pixel carries any alpha
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|p| p[3] == 0)
    }

    /// Tight bounds around every pixel with non-zero alpha
    #[must_use]
    pub fn occupied_bounds(&self) -> Option<PixelBounds> {
        let mut bounds: Option<PixelBounds> = None;
        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel[3] == 0 {
                continue;
            }
            let b = bounds.get_or_insert(PixelBounds {
                x0: x,
                y0: y,
                x1: x + 1,
                y1: y + 1,
            });
            b.x0 = b.x0.min(x);
            b.y0 = b.y0.min(y);
            b.x1 = b.x1.max(x + 1);
            b.y1 = b.y1.max(y + 1);
        }
        bounds
    }

    /// Zero every pixel outside `bounds`
    pub fn clip_to(&mut self, bounds: &PixelBounds) {
        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            if !bounds.contains(i64::from(x), i64::from(y)) {
                pixel.0 = [0, 0, 0, 0];
            }
        }
    }

    /// Alpha channel as a grayscale image
    #[must_use]
    pub fn to_alpha_image(&self) -> GrayImage {
        let (width, height) = self.image.dimensions();
        GrayImage::from_fn(width, height, |x, y| Luma([self.image.get_pixel(x, y)[3]]))
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.image.width() as usize * self.image.height() as usize;
        let mut masked_pixels = 0;
        let mut reinforced_pixels = 0;
        let mut opaque_pixels = 0;
        for pixel in self.image.pixels() {
            let alpha = pixel[3];
            if alpha > 0 {
                masked_pixels += 1;
            }
            if alpha >= Self::EDGE_ALPHA {
                reinforced_pixels += 1;
            }
            if alpha == u8::MAX {
                opaque_pixels += 1;
            }
        }

        MaskStatistics {
            total_pixels,
            masked_pixels,
            reinforced_pixels,
            opaque_pixels,
            coverage_ratio: if total_pixels == 0 {
                0.0
            } else {
                masked_pixels as f32 / total_pixels as f32
            },
        }
    }

    /// Save mask as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about an object mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub masked_pixels: usize,
    pub reinforced_pixels: usize,
    pub opaque_pixels: usize,
    pub coverage_ratio: f32,
}

/// Timing breakdown for one detection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionTimings {
    pub flood_fill_ms: u64,
    pub smoothing_ms: u64,
    pub edge_detection_ms: u64,
    pub merge_ms: u64,
    pub total_ms: u64,
}

impl DetectionTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Fill: {}ms | Smooth: {}ms | Edges: {}ms | Merge: {}ms",
            self.total_ms,
            self.flood_fill_ms,
            self.smoothing_ms,
            self.edge_detection_ms,
            self.merge_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_from_corners_normalizes_any_drag_direction() {
        let b = SelectionBox::from_corners(Point::new(40.0, 30.0), Point::new(10.0, 5.0));
        assert_eq!(b, SelectionBox::new(10.0, 5.0, 30.0, 25.0));

        let b = SelectionBox::from_corners(Point::new(10.0, 30.0), Point::new(40.0, 5.0));
        assert_eq!(b, SelectionBox::new(10.0, 5.0, 30.0, 25.0));
    }

    #[test]
    fn test_seed_is_floored_center() {
        assert_eq!(SelectionBox::new(10.0, 10.0, 50.0, 50.0).seed(), (35, 35));
        assert_eq!(SelectionBox::new(0.5, 0.5, 5.0, 6.0).seed(), (3, 3));
    }

    #[test]
    fn test_pixel_bounds_follow_half_open_rule() {
        let b = SelectionBox::new(10.0, 10.0, 50.0, 50.0).pixel_bounds(100, 100);
        assert_eq!(b, PixelBounds { x0: 10, y0: 10, x1: 60, y1: 60 });
        assert_eq!(b.area(), 2500);

        let b = SelectionBox::new(2.5, 3.2, 4.0, 4.0).pixel_bounds(100, 100);
        // columns 3..=6 satisfy 2.5 <= c < 6.5
        assert_eq!((b.x0, b.x1), (3, 7));
        assert_eq!((b.y0, b.y1), (4, 8));

        let clipped = SelectionBox::new(90.0, -5.0, 50.0, 20.0).pixel_bounds(100, 100);
        assert_eq!(clipped, PixelBounds { x0: 90, y0: 0, x1: 100, y1: 15 });
    }

    #[test]
    fn test_contains_pixel_matches_pixel_bounds() {
        let sel = SelectionBox::new(2.5, 3.2, 4.0, 4.0);
        let bounds = sel.pixel_bounds(20, 20);
        for y in 0..20 {
            for x in 0..20 {
                assert_eq!(
                    sel.contains_pixel(x, y),
                    bounds.contains(i64::from(x), i64::from(y)),
                    "mismatch at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn test_mask_statistics_and_bounds() {
        let mut image = RgbaImage::new(10, 10);
        image.put_pixel(2, 3, Rgba([255, 100, 100, 150]));
        image.put_pixel(5, 7, Rgba([255, 100, 100, 255]));
        let mask = ObjectMask::new(image);

        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 100);
        assert_eq!(stats.masked_pixels, 2);
        assert_eq!(stats.reinforced_pixels, 1);
        assert_eq!(stats.opaque_pixels, 1);

        assert_eq!(
            mask.occupied_bounds(),
            Some(PixelBounds { x0: 2, y0: 3, x1: 6, y1: 8 })
        );
        assert_eq!(mask.alpha_at(2, 3), 150);
        assert_eq!(mask.alpha_at(50, 50), 0);
        assert_eq!(mask.to_alpha_image().get_pixel(5, 7)[0], 255);
    }

    #[test]
    fn test_clip_to_zeroes_outside() {
        let mask_image = RgbaImage::from_pixel(6, 6, Rgba([1, 2, 3, 4]));
        let mut mask = ObjectMask::new(mask_image);
        mask.clip_to(&PixelBounds { x0: 1, y0: 1, x1: 3, y1: 3 });
        assert_eq!(mask.statistics().masked_pixels, 4);
        assert_eq!(mask.as_image().get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        assert!(ObjectMask::from_raw(2, 2, vec![0; 16]).is_ok());
        assert!(ObjectMask::from_raw(2, 2, vec![0; 15]).is_err());
    }
}

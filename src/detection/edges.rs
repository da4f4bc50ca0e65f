//! Sobel edge map over an RGBA raster.
//!
//! Only interior pixels get a gradient. The first and last row and column are
//! left fully transparent black rather than padded.

use image::{Rgba, RgbaImage};

const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Value written to R, G and B of an edge pixel
pub const EDGE_ON: u8 = 255;

/// Rounded luma of an RGBA pixel
#[inline]
fn luma(pixel: &Rgba<u8>) -> i32 {
    let [r, g, b, _] = pixel.0;
    (LUMA_R * f64::from(r) + LUMA_G * f64::from(g) + LUMA_B * f64::from(b)).round() as i32
}

/// Binary edge map: interior pixels are `(255, 255, 255, 255)` when the Sobel
/// magnitude exceeds `threshold`, `(0, 0, 0, 255)` otherwise.
#[must_use]
pub fn detect_edges(image: &RgbaImage, threshold: u8) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mut edges = RgbaImage::new(width, height);
    if width < 3 || height < 3 {
        return edges;
    }

    let w = width as usize;
    // Border luma feeds the outer ring of interior pixels
    let gray: Vec<i32> = image.pixels().map(luma).collect();

    let at = |x: u32, y: u32| gray[y as usize * w + x as usize];
    let threshold = f64::from(threshold);

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = -at(x - 1, y - 1) - 2 * at(x - 1, y) - at(x - 1, y + 1)
                + at(x + 1, y - 1)
                + 2 * at(x + 1, y)
                + at(x + 1, y + 1);
            let gy = -at(x - 1, y - 1) - 2 * at(x, y - 1) - at(x + 1, y - 1)
                + at(x - 1, y + 1)
                + 2 * at(x, y + 1)
                + at(x + 1, y + 1);

            let magnitude = f64::from(gx * gx + gy * gy).sqrt();
            let strength = if magnitude > threshold { EDGE_ON } else { 0 };
            edges.put_pixel(x, y, Rgba([strength, strength, strength, 255]));
        }
    }

    edges
}

/// Whether `(x, y)` is marked as an edge
#[inline]
#[must_use]
pub fn is_edge(edges: &RgbaImage, x: u32, y: u32) -> bool {
    edges.get_pixel_checked(x, y).is_some_and(|p| p[0] > 0)
}

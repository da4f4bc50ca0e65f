//! Color-similarity flood fill constrained to the selection bounds.

use crate::types::{ObjectMask, PixelBounds};
use image::{Rgba, RgbaImage};

/// Largest Euclidean distance between two RGB colors, rounded (`sqrt(3) * 255`)
pub const MAX_RGB_DISTANCE: f64 = 442.0;

/// Offset of the four extra reference samples around the seed
pub const SAMPLE_OFFSET: i64 = 5;

/// Color written for every included pixel
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 100, 100, ObjectMask::FILL_ALPHA]);

/// Pops between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

const NEIGHBORS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Mean RGB of the seed and the four points `SAMPLE_OFFSET` px away on each axis.
///
/// Samples falling outside the image are clamped onto its edge.
#[must_use]
pub fn reference_color(image: &RgbaImage, seed: (i64, i64)) -> [f64; 3] {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return [0.0; 3];
    }

    let samples = [
        (seed.0, seed.1),
        (seed.0 + SAMPLE_OFFSET, seed.1),
        (seed.0 - SAMPLE_OFFSET, seed.1),
        (seed.0, seed.1 + SAMPLE_OFFSET),
        (seed.0, seed.1 - SAMPLE_OFFSET),
    ];

    let mut sum = [0.0f64; 3];
    for (sx, sy) in samples {
        let x = sx.clamp(0, i64::from(width) - 1) as u32;
        let y = sy.clamp(0, i64::from(height) - 1) as u32;
        let pixel = image.get_pixel(x, y);
        for (acc, channel) in sum.iter_mut().zip(pixel.0) {
            *acc += f64::from(channel);
        }
    }

    let n = samples.len() as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

#[inline]
fn distance_sq(pixel: &Rgba<u8>, reference: &[f64; 3]) -> f64 {
    let dr = f64::from(pixel[0]) - reference[0];
    let dg = f64::from(pixel[1]) - reference[1];
    let db = f64::from(pixel[2]) - reference[2];
    dr * dr + dg * dg + db * db
}

/// Grow a mask from `seed` over 8-connected pixels whose RGB distance to the
/// sampled reference color is at most `sensitivity * 442`.
///
/// The fill never leaves `bounds`; included pixels are painted [`HIGHLIGHT`].
#[must_use]
pub fn bounded_flood_fill(
    image: &RgbaImage,
    seed: (i64, i64),
    bounds: &PixelBounds,
    sensitivity: f32,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    fill(image, seed, bounds, sensitivity, &|| false)
        .unwrap_or_else(|| RgbaImage::new(width, height))
}

/// Same as [`bounded_flood_fill`], polling `is_cancelled` while the stack drains.
///
/// Returns `None` once cancellation is observed.
#[must_use]
pub fn bounded_flood_fill_cancellable(
    image: &RgbaImage,
    seed: (i64, i64),
    bounds: &PixelBounds,
    sensitivity: f32,
    is_cancelled: &dyn Fn() -> bool,
) -> Option<RgbaImage> {
    fill(image, seed, bounds, sensitivity, is_cancelled)
}

fn fill(
    image: &RgbaImage,
    seed: (i64, i64),
    bounds: &PixelBounds,
    sensitivity: f32,
    is_cancelled: &dyn Fn() -> bool,
) -> Option<RgbaImage> {
    let (width, height) = image.dimensions();
    let mut mask = RgbaImage::new(width, height);

    let bounds = PixelBounds {
        x0: bounds.x0.min(width),
        y0: bounds.y0.min(height),
        x1: bounds.x1.min(width),
        y1: bounds.y1.min(height),
    };
    if bounds.is_empty() || !bounds.contains(seed.0, seed.1) {
        return Some(mask);
    }

    let reference = reference_color(image, seed);
    let threshold = f64::from(sensitivity) * MAX_RGB_DISTANCE;
    let threshold_sq = threshold * threshold;

    let bw = bounds.width() as usize;
    let mut visited = vec![false; bw * bounds.height() as usize];
    let index = |x: i64, y: i64| {
        (y - i64::from(bounds.y0)) as usize * bw + (x - i64::from(bounds.x0)) as usize
    };

    let mut stack = vec![seed];
    visited[index(seed.0, seed.1)] = true;
    let mut pops = 0usize;

    while let Some((x, y)) = stack.pop() {
        pops += 1;
        if pops % CANCEL_CHECK_INTERVAL == 0 && is_cancelled() {
            return None;
        }

        let (px, py) = (x as u32, y as u32);
        if distance_sq(image.get_pixel(px, py), &reference) > threshold_sq {
            continue;
        }
        mask.put_pixel(px, py, HIGHLIGHT);

        for (dx, dy) in NEIGHBORS {
            let (nx, ny) = (x + dx, y + dy);
            if !bounds.contains(nx, ny) {
                continue;
            }
            let slot = index(nx, ny);
            if !visited[slot] {
                visited[slot] = true;
                stack.push((nx, ny));
            }
        }
    }

    Some(mask)
}

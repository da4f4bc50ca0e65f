//! Iterated 3x3 box blur applied to all four mask channels.

use image::RgbaImage;

/// Blur `mask` `iterations` times.
///
/// Each pass reads only the previous pass's output. Border pixels are copied
/// through untouched.
#[must_use]
pub fn smooth_mask(mask: &RgbaImage, iterations: u8) -> RgbaImage {
    let mut current = mask.clone();
    let (width, height) = current.dimensions();
    if iterations == 0 || width < 3 || height < 3 {
        return current;
    }

    let w = width as usize;
    let mut next = current.clone();

    for _ in 0..iterations {
        {
            let src: &[u8] = current.as_raw();
            let dst: &mut [u8] = &mut next;
            for y in 1..height as usize - 1 {
                for x in 1..w - 1 {
                    for c in 0..4 {
                        let mut sum = 0u32;
                        for ny in y - 1..=y + 1 {
                            let row = ny * w;
                            for nx in x - 1..=x + 1 {
                                sum += u32::from(src[(row + nx) * 4 + c]);
                            }
                        }
                        // Truncating mean: 255 only when all nine inputs are 255
                        dst[(y * w + x) * 4 + c] = (sum / 9) as u8;
                    }
                }
            }
        }
        std::mem::swap(&mut current, &mut next);
    }

    current
}

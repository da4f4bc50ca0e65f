//! End-to-end detection scenarios on synthetic images
//!
//! These tests run the whole fill, smooth, clip and edge merge pipeline
//! through the public API.

use image::{Rgba, RgbaImage};
use objmask::{
    detect_object_in_box, error::Result, DetectionSettings, FloodFillDetector, NeverCancel,
    ObjectDetector, SelectionBox,
};

/// Dark square on a light background
fn create_square_scene(size: u32, square: (u32, u32, u32)) -> RgbaImage {
    let (left, top, side) = square;
    RgbaImage::from_fn(size, size, |x, y| {
        if (left..left + side).contains(&x) && (top..top + side).contains(&y) {
            Rgba([20, 20, 25, 255])
        } else {
            Rgba([235, 235, 230, 255])
        }
    })
}

fn settings(sensitivity: f32, edge_threshold: u8, smoothing: u8) -> DetectionSettings {
    DetectionSettings {
        sensitivity,
        edge_threshold,
        smoothing,
    }
}

#[test]
fn test_solid_image_fills_whole_box() -> Result<()> {
    let image = RgbaImage::from_pixel(100, 100, Rgba([90, 140, 60, 255]));
    let selection = SelectionBox::new(10.0, 10.0, 50.0, 50.0);

    let outcome = detect_object_in_box(&image, &selection, &settings(0.3, 50, 0))?;

    assert_eq!(outcome.mask.statistics().masked_pixels, 2500);
    for y in 10..60 {
        for x in 10..60 {
            assert_eq!(outcome.mask.alpha_at(x, y), 150, "pixel ({x}, {y})");
        }
    }
    Ok(())
}

#[test]
fn test_mask_stays_inside_selection() -> Result<()> {
    let image = create_square_scene(120, (30, 30, 50));
    let selections = [
        SelectionBox::new(20.0, 20.0, 70.0, 70.0),
        SelectionBox::new(45.0, 40.0, 12.0, 30.0),
        SelectionBox::new(0.0, 0.0, 119.0, 119.0),
        SelectionBox::new(100.5, 100.5, 30.0, 30.0),
    ];

    for selection in &selections {
        for smoothing in [0, 2, 5] {
            let outcome = detect_object_in_box(&image, selection, &settings(0.5, 40, smoothing))?;
            let mask = outcome.mask.as_image();
            for (x, y, pixel) in mask.enumerate_pixels() {
                if pixel[3] > 0 {
                    assert!(
                        selection.contains_pixel(x, y),
                        "({x}, {y}) outside {selection:?} with smoothing {smoothing}"
                    );
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_fill_stops_at_object_boundary() -> Result<()> {
    let image = create_square_scene(100, (30, 30, 40));
    let selection = SelectionBox::new(20.0, 20.0, 60.0, 60.0);

    let outcome = detect_object_in_box(&image, &selection, &settings(0.3, 0, 0))?;

    assert_eq!(outcome.mask.statistics().masked_pixels, 40 * 40);
    assert_eq!(outcome.mask.alpha_at(50, 50), 150);
    assert_eq!(outcome.mask.alpha_at(25, 25), 0);
    Ok(())
}

#[test]
fn test_edges_reinforce_object_outline() -> Result<()> {
    let image = create_square_scene(100, (30, 30, 40));
    let selection = SelectionBox::new(20.0, 20.0, 60.0, 60.0);

    let outcome = detect_object_in_box(&image, &selection, &settings(0.3, 50, 0))?;
    let stats = outcome.mask.statistics();

    assert!(stats.reinforced_pixels > 0);
    // Square border pixels sit on the luminance step
    assert!(outcome.mask.alpha_at(30, 50) >= 200);
    // Interior is flat
    assert_eq!(outcome.mask.alpha_at(50, 50), 150);
    Ok(())
}

#[test]
fn test_detection_is_deterministic() -> Result<()> {
    let image = RgbaImage::from_fn(64, 64, |x, y| {
        Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255])
    });
    let selection = SelectionBox::new(8.0, 8.0, 40.0, 40.0);
    let config = settings(0.4, 30, 3);

    let detector = FloodFillDetector::new();
    let first = detector.detect(&image, &selection, &config, &NeverCancel)?;
    let second = detector.detect(&image, &selection, &config, &NeverCancel)?;

    assert_eq!(first.mask, second.mask);
    Ok(())
}

#[test]
fn test_timings_are_consistent() -> Result<()> {
    let image = create_square_scene(80, (20, 20, 30));
    let selection = SelectionBox::new(10.0, 10.0, 50.0, 50.0);

    let outcome = detect_object_in_box(&image, &selection, &DetectionSettings::default())?;
    let timings = outcome.timings;

    let stages = timings.flood_fill_ms
        + timings.smoothing_ms
        + timings.edge_detection_ms
        + timings.merge_ms;
    assert!(timings.total_ms >= stages);
    assert!(timings.summary().contains("Total"));
    Ok(())
}

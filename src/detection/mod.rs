//! Object detection inside a user-drawn box
//!
//! The pipeline is fill, smooth, clip to the box, then merge edges:
//!
//! 1. [`flood_fill::bounded_flood_fill`] grows a raw mask from the box center
//! 2. [`smoothing::smooth_mask`] softens it
//! 3. the softened mask is clipped back to the box so no pixel leaks outside
//! 4. [`edges::detect_edges`] runs on the source raster and
//!    [`crate::compositor::merge_edges`] reinforces masked edge pixels
//!
//! Step 4 is skipped when the edge threshold is zero.

pub mod edges;
pub mod flood_fill;
pub mod smoothing;

use crate::compositor::merge_edges;
use crate::config::DetectionSettings;
use crate::error::{MaskError, Result};
use crate::types::{DetectionTimings, ObjectMask, SelectionBox};
use image::RgbaImage;
use instant::Instant;
use log::debug;
use tokio_util::sync::CancellationToken;
use tracing::{debug as trace_debug, span, Level};

/// Polled between detection stages and periodically inside the fill loop
pub trait CancellationCheck: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Cancellation source for synchronous callers
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationCheck for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancellationCheck for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

/// Result of a successful detection
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub mask: ObjectMask,
    /// Selection the mask was computed for, in canvas space
    pub selection: SelectionBox,
    pub timings: DetectionTimings,
}

/// Computes an object mask for a selection on a canvas-sized raster
pub trait ObjectDetector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run detection for `selection` over `image`
    ///
    /// # Errors
    /// - `InvalidConfig` when `settings` fail validation
    /// - `InvalidSelection` when the box covers no pixel of `image`
    /// - `Detection` when the raster is empty
    /// - `Cancelled` once `cancel` reports cancellation
    fn detect(
        &self,
        image: &RgbaImage,
        selection: &SelectionBox,
        settings: &DetectionSettings,
        cancel: &dyn CancellationCheck,
    ) -> Result<DetectionOutcome>;
}

/// Color-similarity flood fill with smoothing and edge reinforcement
#[derive(Debug, Clone, Copy, Default)]
pub struct FloodFillDetector;

impl FloodFillDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn ensure_active(cancel: &dyn CancellationCheck, stage: &str) -> Result<()> {
    if cancel.is_cancelled() {
        trace_debug!(stage, "detection cancelled");
        return Err(MaskError::Cancelled);
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl ObjectDetector for FloodFillDetector {
    fn name(&self) -> &'static str {
        "flood-fill"
    }

    fn detect(
        &self,
        image: &RgbaImage,
        selection: &SelectionBox,
        settings: &DetectionSettings,
        cancel: &dyn CancellationCheck,
    ) -> Result<DetectionOutcome> {
        settings.validate()?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(MaskError::detection_stage_error(
                "input",
                "raster has no pixels",
                Some(&format!("{}x{}", width, height)),
            ));
        }

        let bounds = selection.pixel_bounds(width, height);
        if bounds.is_empty() {
            return Err(MaskError::invalid_selection(format!(
                "box {:.1},{:.1} {:.1}x{:.1} covers no pixel of a {}x{} canvas",
                selection.x, selection.y, selection.width, selection.height, width, height
            )));
        }

        let _span = span!(
            Level::DEBUG,
            "detection",
            detector = self.name(),
            canvas = %format!("{}x{}", width, height),
            selection = %format!(
                "{:.0},{:.0} {:.0}x{:.0}",
                selection.x, selection.y, selection.width, selection.height
            ),
            sensitivity = settings.sensitivity,
            edge_threshold = settings.edge_threshold,
            smoothing = settings.smoothing
        )
        .entered();

        let mut timings = DetectionTimings::default();
        let total_start = Instant::now();

        ensure_active(cancel, "flood_fill")?;
        let stage_start = Instant::now();
        let seed = selection.seed();
        let raw = flood_fill::bounded_flood_fill_cancellable(
            image,
            seed,
            &bounds,
            settings.sensitivity,
            &|| cancel.is_cancelled(),
        )
        .ok_or(MaskError::Cancelled)?;
        timings.flood_fill_ms = elapsed_ms(stage_start);
        trace_debug!(
            seed_x = seed.0,
            seed_y = seed.1,
            ms = timings.flood_fill_ms,
            "flood fill complete"
        );

        ensure_active(cancel, "smoothing")?;
        let stage_start = Instant::now();
        let mut mask = ObjectMask::new(smoothing::smooth_mask(&raw, settings.smoothing));
        mask.clip_to(&bounds);
        timings.smoothing_ms = elapsed_ms(stage_start);
        trace_debug!(
            iterations = settings.smoothing,
            ms = timings.smoothing_ms,
            "smoothing complete"
        );

        if settings.edges_enabled() {
            ensure_active(cancel, "edge_detection")?;
            let stage_start = Instant::now();
            let edge_map = edges::detect_edges(image, settings.edge_threshold);
            timings.edge_detection_ms = elapsed_ms(stage_start);

            let stage_start = Instant::now();
            let mut merged = mask.into_image();
            merge_edges(&mut merged, &edge_map);
            mask = ObjectMask::new(merged);
            timings.merge_ms = elapsed_ms(stage_start);
            trace_debug!(
                edge_ms = timings.edge_detection_ms,
                merge_ms = timings.merge_ms,
                "edge reinforcement complete"
            );
        } else {
            debug!("Edge threshold is 0, skipping edge reinforcement");
        }

        timings.total_ms = elapsed_ms(total_start);
        trace_debug!(timings = %timings.summary(), "detection finished");

        Ok(DetectionOutcome {
            mask,
            selection: *selection,
            timings,
        })
    }
}

/// Run the default detector synchronously with no cancellation
///
/// # Errors
/// See [`ObjectDetector::detect`].
pub fn detect_object_in_box(
    image: &RgbaImage,
    selection: &SelectionBox,
    settings: &DetectionSettings,
) -> Result<DetectionOutcome> {
    FloodFillDetector.detect(image, selection, settings, &NeverCancel)
}

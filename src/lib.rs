#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # objmask
//!
//! Headless object mask preview for box-driven object removal.
//!
//! A user drags a box over an image. The crate grows an approximate object mask
//! from the box center by color similarity, softens it, reinforces it with a
//! Sobel edge map and renders it as a contour or filled overlay. The result is
//! an [`ObjectRemovalConfig`] ready to be serialized and sent to an inpainting
//! backend.
//!
//! ## Features
//!
//! - **Bounded flood fill**: 8-connected region growing clipped to the selection
//! - **Mask smoothing**: iterated 3×3 box blur over all four channels
//! - **Edge reinforcement**: Sobel magnitude threshold merged into the mask alpha
//! - **Overlay composition**: contour or box views, selection labels, size readout
//! - **Interaction state machine**: Idle, Drawing, Detecting and Detected states
//!   driven by pointer events
//! - **Background detection**: optional tokio worker with cancellation
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use objmask::{
//!     MaskPreviewSession, PointerEvent, PreviewConfig, SessionEvent, StateKind,
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let image = image::open("photo.jpg")?.to_rgba8();
//! let display_size = image.dimensions();
//!
//! let mut session = MaskPreviewSession::new(PreviewConfig::default());
//! session.load_image(image, display_size)?;
//!
//! session.dispatch(SessionEvent::PointerDown(PointerEvent::new(40.0, 40.0)));
//! session.dispatch(SessionEvent::PointerMove(PointerEvent::new(160.0, 120.0)));
//! let state = session.dispatch(SessionEvent::PointerUp(PointerEvent::new(160.0, 120.0)));
//!
//! if state == StateKind::Detected {
//!     println!("{}", session.removal_config().to_json()?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): Command-line interface, spinner and tracing subscriber setup
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! objmask = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod debounce;
pub mod detection;
pub mod error;
pub mod mapping;
pub mod session;
pub mod tracing_config;
pub mod types;
pub mod worker;

use tokio::io::AsyncRead;

// Public API exports
pub use compositor::{
    blit, compose_overlay, flatten_onto, CanvasSurface, Overlay, OverlayShape, OverlayState,
    RasterSurface,
};
pub use config::{
    DetectionSettings, ObjectRemovalConfig, PreviewConfig, Quality, RemovalMethod, ViewMode,
};
pub use debounce::ResizeDebouncer;
pub use detection::{
    detect_object_in_box, CancellationCheck, DetectionOutcome, FloodFillDetector, NeverCancel,
    ObjectDetector,
};
pub use error::{MaskError, Result};
pub use mapping::{canvas_point, CanvasLayout, ImageScale, PointerEvent};
pub use session::{
    ConfigListener, DetectionMode, DetectionRequest, MaskPreviewSession, NoOpListener,
    SelectionState, SessionEvent, StateKind,
};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use types::{
    Coordinates, DetectionTimings, MaskPayload, MaskStatistics, ObjectMask, PixelBounds, Point,
    SelectionBox,
};
pub use worker::{DetectionResponse, DetectionWorker};

/// Detect the object inside `selection` of an encoded image
///
/// Decodes `image_bytes` (PNG or JPEG), then runs the default detector with no
/// cancellation. The selection is in the decoded image's pixel space.
///
/// # Examples
///
/// ```rust,no_run
/// use objmask::{detect_object_from_bytes, DetectionSettings, SelectionBox};
///
/// # fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let selection = SelectionBox::new(10.0, 10.0, 120.0, 80.0);
/// let settings = DetectionSettings::default();
/// let outcome = detect_object_from_bytes(&upload_bytes, &selection, &settings)?;
/// outcome.mask.save_png("mask.png")?;
/// # Ok(())
/// # }
/// ```
pub fn detect_object_from_bytes(
    image_bytes: &[u8],
    selection: &SelectionBox,
    settings: &DetectionSettings,
) -> Result<DetectionOutcome> {
    let image = image::load_from_memory(image_bytes)?.to_rgba8();
    detect_object_in_box(&image, selection, settings)
}

/// Detect the object inside `selection` of an image read from an async stream
///
/// The whole stream is buffered before decoding.
pub async fn detect_object_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    selection: &SelectionBox,
    settings: &DetectionSettings,
) -> Result<DetectionOutcome> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    detect_object_from_bytes(&buffer, selection, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encoded_solid(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([30, 90, 200, 255]));
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_detect_from_bytes() {
        let bytes = encoded_solid(40, 40);
        let selection = SelectionBox::new(5.0, 5.0, 20.0, 10.0);
        let outcome =
            detect_object_from_bytes(&bytes, &selection, &DetectionSettings::default()).unwrap();
        assert_eq!(outcome.mask.dimensions(), (40, 40));
        assert!(outcome.mask.statistics().masked_pixels > 0);
    }

    #[test]
    fn test_detect_from_garbage_bytes() {
        let selection = SelectionBox::new(0.0, 0.0, 10.0, 10.0);
        let result =
            detect_object_from_bytes(b"not an image", &selection, &DetectionSettings::default());
        assert!(matches!(result, Err(MaskError::Image(_))));
    }

    #[tokio::test]
    async fn test_detect_from_reader() {
        let reader = Cursor::new(encoded_solid(32, 32));
        let selection = SelectionBox::new(4.0, 4.0, 16.0, 16.0);
        let outcome = detect_object_from_reader(reader, &selection, &DetectionSettings::default())
            .await
            .unwrap();
        assert_eq!(outcome.selection, selection);
    }
}

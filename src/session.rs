//! Mask preview session
//!
//! [`MaskPreviewSession`] owns everything the preview panel keeps between
//! pointer events: the canvas-sized preview raster, the image scale, the
//! selection state machine, the committed selection and the
//! [`ObjectRemovalConfig`] that is reported to the parent form.
//!
//! State transitions happen only through [`MaskPreviewSession::dispatch`]:
//!
//! ```text
//! Idle ──down──▶ Drawing ──move──▶ Drawing
//! Drawing ──up, box ≥ min──▶ Detecting ──ok──▶ Detected
//! Drawing ──up, box < min──▶ Idle        Detecting ──err──▶ Idle
//! Detected ──down──▶ Drawing             any ──clear──▶ Idle
//! ```

use crate::compositor::{blit, compose_overlay, CanvasSurface, Overlay, OverlayState};
use crate::config::{
    DetectionSettings, ObjectRemovalConfig, PreviewConfig, Quality, RemovalMethod, ViewMode,
};
use crate::debounce::ResizeDebouncer;
use crate::detection::{DetectionOutcome, FloodFillDetector, NeverCancel, ObjectDetector};
use crate::error::{MaskError, Result};
use crate::mapping::{canvas_point, CanvasLayout, ImageScale, PointerEvent};
use crate::types::{DetectionTimings, ObjectMask, Point, SelectionBox};
use image::imageops::FilterType;
use image::RgbaImage;
use instant::Instant;
use log::info;
use std::sync::Arc;
use tracing::{debug as trace_debug, error as trace_error, span, Level};

/// Receives every change to the removal config, plus busy-indicator updates
pub trait ConfigListener: Send + Sync {
    /// Called with the full config after each change
    fn on_config_change(&self, config: &ObjectRemovalConfig);

    /// Called when a detection starts (`true`) or ends (`false`)
    fn on_busy_change(&self, busy: bool) {
        let _ = busy;
    }
}

/// Listener that ignores all notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

impl ConfigListener for NoOpListener {
    fn on_config_change(&self, _config: &ObjectRemovalConfig) {}
}

/// Selection state machine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    /// Pointer is down and a box is being dragged
    Drawing { start: Point, current: Point },
    /// Box committed, detection running
    Detecting { selection: SelectionBox },
    /// Detection finished with a mask
    Detected {
        selection: SelectionBox,
        mask: ObjectMask,
    },
}

/// Discriminant of [`SelectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Drawing,
    Detecting,
    Detected,
}

impl SelectionState {
    #[must_use]
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Idle => StateKind::Idle,
            Self::Drawing { .. } => StateKind::Drawing,
            Self::Detecting { .. } => StateKind::Detecting,
            Self::Detected { .. } => StateKind::Detected,
        }
    }

    /// Box currently being dragged
    #[must_use]
    pub fn live_box(&self) -> Option<SelectionBox> {
        match self {
            Self::Drawing { start, current } => Some(SelectionBox::from_corners(*start, *current)),
            _ => None,
        }
    }

    #[must_use]
    pub fn mask(&self) -> Option<&ObjectMask> {
        match self {
            Self::Detected { mask, .. } => Some(mask),
            _ => None,
        }
    }
}

/// Input to [`MaskPreviewSession::dispatch`]
#[derive(Debug)]
pub enum SessionEvent {
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    Clear,
    /// Result of a deferred detection request
    DetectionFinished {
        id: u64,
        result: Result<DetectionOutcome>,
    },
}

/// Where detection runs after a box is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// Synchronously inside the pointer-up dispatch
    #[default]
    Inline,
    /// Queued as a [`DetectionRequest`] for an external worker
    Deferred,
}

/// Detection job handed to a worker in [`DetectionMode::Deferred`]
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub id: u64,
    /// Canvas-sized raster the selection refers to
    pub image: Arc<RgbaImage>,
    pub selection: SelectionBox,
    pub settings: DetectionSettings,
}

struct LoadedImage {
    source: RgbaImage,
    preview: Arc<RgbaImage>,
}

/// Headless object mask preview panel
pub struct MaskPreviewSession {
    config: PreviewConfig,
    removal: ObjectRemovalConfig,
    state: SelectionState,
    committed: Option<SelectionBox>,
    image: Option<LoadedImage>,
    layout: Option<CanvasLayout>,
    scale: ImageScale,
    detector: Arc<dyn ObjectDetector>,
    listener: Arc<dyn ConfigListener>,
    mode: DetectionMode,
    pending_request: Option<DetectionRequest>,
    in_flight: Option<(u64, DetectionSettings)>,
    next_request_id: u64,
    resize: ResizeDebouncer<(u32, u32)>,
    last_timings: Option<DetectionTimings>,
}

impl std::fmt::Debug for MaskPreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskPreviewSession")
            .field("state", &self.state.kind())
            .field("committed", &self.committed)
            .field("canvas_size", &self.canvas_size())
            .field("scale", &self.scale)
            .field("detector", &self.detector.name())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl MaskPreviewSession {
    /// Create a session with the flood fill detector and no listener
    #[must_use]
    pub fn new(config: PreviewConfig) -> Self {
        let resize = ResizeDebouncer::new(config.resize_debounce);
        Self {
            config,
            removal: ObjectRemovalConfig::default(),
            state: SelectionState::Idle,
            committed: None,
            image: None,
            layout: None,
            scale: ImageScale::IDENTITY,
            detector: Arc::new(FloodFillDetector::new()),
            listener: Arc::new(NoOpListener),
            mode: DetectionMode::Inline,
            pending_request: None,
            in_flight: None,
            next_request_id: 1,
            resize,
            last_timings: None,
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn ObjectDetector>) -> Self {
        self.detector = detector;
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ConfigListener>) -> Self {
        self.listener = listener;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DetectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Start from an existing removal config, e.g. one restored from a draft job
    #[must_use]
    pub fn with_removal_config(mut self, removal: ObjectRemovalConfig) -> Self {
        self.removal = removal;
        self
    }

    /// Load a decoded image shown at `display_size` canvas pixels.
    ///
    /// Resets the selection, keeps quality and detection settings. Replacing a
    /// previously loaded image also clears the removal config's coordinates and mask.
    ///
    /// # Errors
    /// `InvalidConfig` when either the image or the display size is empty.
    pub fn load_image(&mut self, source: RgbaImage, display_size: (u32, u32)) -> Result<()> {
        let natural = source.dimensions();
        if natural.0 == 0 || natural.1 == 0 {
            return Err(MaskError::invalid_config("image has no pixels"));
        }
        ensure_display_size(display_size)?;

        let preview = resize_for_display(&source, display_size);
        let replacing = self.image.is_some();
        self.scale = ImageScale::from_sizes(natural, display_size);
        self.layout = Some(self.layout_for(display_size));
        self.image = Some(LoadedImage {
            source,
            preview: Arc::new(preview),
        });
        // Coordinates and mask of the previous image do not apply to this one
        if replacing {
            self.clear_selection();
        } else {
            self.reset_selection();
        }
        self.resize.cancel();

        info!(
            "Loaded {}x{} image at {}x{} (scale {:.3}x{:.3})",
            natural.0,
            natural.1,
            display_size.0,
            display_size.1,
            self.scale.scale_x,
            self.scale.scale_y
        );
        Ok(())
    }

    /// Update the canvas's on-screen rectangle used for pointer mapping
    pub fn set_client_rect(&mut self, left: f64, top: f64, width: f64, height: f64) {
        if let Some(layout) = &mut self.layout {
            layout.rect_left = left;
            layout.rect_top = top;
            layout.rect_width = width;
            layout.rect_height = height;
        }
    }

    /// Record a window resize; applied by [`Self::poll_resize`] after the debounce delay
    pub fn notify_resize(&mut self, display_size: (u32, u32), now: Instant) {
        self.resize.schedule(display_size, now);
    }

    /// Apply a settled resize, if any.
    ///
    /// Returns whether the canvas size changed. A size change drops the preview
    /// mask and rescales the committed box; the removal config is kept.
    ///
    /// # Errors
    /// `InvalidConfig` when the settled size is empty.
    pub fn poll_resize(&mut self, now: Instant) -> Result<bool> {
        match self.resize.poll(now) {
            Some(size) => self.apply_display_size(size),
            None => Ok(false),
        }
    }

    fn apply_display_size(&mut self, display_size: (u32, u32)) -> Result<bool> {
        ensure_display_size(display_size)?;
        let Some(loaded) = &mut self.image else {
            return Ok(false);
        };
        if loaded.preview.dimensions() == display_size {
            return Ok(false);
        }

        let natural = loaded.source.dimensions();
        loaded.preview = Arc::new(resize_for_display(&loaded.source, display_size));
        let previous = self.scale;
        self.scale = ImageScale::from_sizes(natural, display_size);
        self.layout = Some(self.layout_for(display_size));

        trace_debug!(
            width = display_size.0,
            height = display_size.1,
            "canvas re-initialized after resize"
        );

        // The removal config is in image space and stays valid. The preview mask
        // is in old canvas pixels, so only the committed box survives, rescaled.
        let committed = self
            .committed
            .map(|selection| rescale_selection(&selection, previous, self.scale));
        self.reset_selection();
        self.committed = committed;
        Ok(true)
    }

    fn layout_for(&self, display_size: (u32, u32)) -> CanvasLayout {
        let (left, top) = self
            .layout
            .map_or((0.0, 0.0), |layout| (layout.rect_left, layout.rect_top));
        CanvasLayout::unscaled(display_size.0, display_size.1, left, top)
    }

    /// Feed one event through the state machine and return the new state
    pub fn dispatch(&mut self, event: SessionEvent) -> StateKind {
        match event {
            SessionEvent::PointerDown(pointer) => self.pointer_down(pointer),
            SessionEvent::PointerMove(pointer) => self.pointer_move(pointer),
            SessionEvent::PointerUp(pointer) => self.pointer_up(pointer),
            SessionEvent::Clear => self.clear_selection(),
            SessionEvent::DetectionFinished { id, result } => self.finish_detection(id, result),
        }
        self.state.kind()
    }

    fn pointer_down(&mut self, pointer: PointerEvent) {
        if self.image.is_none() || self.state.kind() == StateKind::Detecting {
            trace_debug!(state = ?self.state.kind(), "pointer down ignored");
            return;
        }
        let start = canvas_point(pointer, self.layout.as_ref());
        self.state = SelectionState::Drawing {
            start,
            current: start,
        };
    }

    fn pointer_move(&mut self, pointer: PointerEvent) {
        let point = canvas_point(pointer, self.layout.as_ref());
        if let SelectionState::Drawing { current, .. } = &mut self.state {
            *current = point;
        }
    }

    fn pointer_up(&mut self, pointer: PointerEvent) {
        let point = canvas_point(pointer, self.layout.as_ref());
        let SelectionState::Drawing { start, .. } = self.state else {
            return;
        };

        let selection = SelectionBox::from_corners(start, point);
        if !selection.meets_minimum(self.config.min_selection_side) {
            trace_debug!(
                width = selection.width,
                height = selection.height,
                min = self.config.min_selection_side,
                "selection too small, discarded"
            );
            self.state = SelectionState::Idle;
            return;
        }

        self.committed = Some(selection);
        self.begin_detection(selection);
    }

    fn begin_detection(&mut self, selection: SelectionBox) {
        let Some(loaded) = &self.image else {
            self.state = SelectionState::Idle;
            return;
        };

        let id = self.next_request_id;
        self.next_request_id += 1;
        let settings = self.config.settings;
        let image = Arc::clone(&loaded.preview);

        self.state = SelectionState::Detecting { selection };
        self.in_flight = Some((id, settings));
        self.listener.on_busy_change(true);

        match self.mode {
            DetectionMode::Inline => {
                let result = self
                    .detector
                    .detect(&image, &selection, &settings, &NeverCancel);
                self.finish_detection(id, result);
            }
            DetectionMode::Deferred => {
                self.pending_request = Some(DetectionRequest {
                    id,
                    image,
                    selection,
                    settings,
                });
            }
        }
    }

    fn finish_detection(&mut self, id: u64, result: Result<DetectionOutcome>) {
        let selection = match (&self.state, self.in_flight) {
            (SelectionState::Detecting { selection }, Some((current, _))) if current == id => {
                *selection
            }
            _ => {
                trace_debug!(id, "stale detection result dropped");
                return;
            }
        };
        let settings = self.in_flight.take().map_or(self.config.settings, |(_, s)| s);
        self.pending_request = None;
        self.listener.on_busy_change(false);

        let _span = span!(Level::DEBUG, "session", request = id).entered();

        match result {
            Ok(outcome) => {
                let coordinates = self.scale.canvas_to_image(&selection);
                trace_debug!(
                    x = coordinates.x,
                    y = coordinates.y,
                    width = coordinates.width,
                    height = coordinates.height,
                    timings = %outcome.timings.summary(),
                    "object detected"
                );

                self.removal.method = RemovalMethod::PreciseMask;
                self.removal.coordinates = Some(coordinates);
                self.removal.mask = Some(outcome.mask.clone());
                self.removal.detection_settings = Some(settings);
                self.last_timings = Some(outcome.timings);
                self.state = SelectionState::Detected {
                    selection,
                    mask: outcome.mask,
                };
                self.listener.on_config_change(&self.removal);
            }
            Err(err) if err.is_cancelled() => {
                trace_debug!("detection cancelled");
                self.state = SelectionState::Idle;
            }
            Err(err) => {
                trace_error!(error = %err, "object detection failed");
                self.state = SelectionState::Idle;
            }
        }
    }

    fn reset_selection(&mut self) {
        if self.in_flight.take().is_some() {
            self.listener.on_busy_change(false);
        }
        self.pending_request = None;
        self.state = SelectionState::Idle;
        self.committed = None;
    }

    fn clear_selection(&mut self) {
        self.reset_selection();
        self.removal.method = RemovalMethod::BoundingBox;
        self.removal.coordinates = None;
        self.removal.mask = None;
        self.listener.on_config_change(&self.removal);
    }

    /// Take the queued request in [`DetectionMode::Deferred`]
    pub fn take_detection_request(&mut self) -> Option<DetectionRequest> {
        self.pending_request.take()
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.removal.quality = Some(quality);
        self.listener.on_config_change(&self.removal);
    }

    /// Replace the detection sliders; they apply to the next detection
    ///
    /// # Errors
    /// `InvalidConfig` for out-of-range values.
    pub fn update_settings(&mut self, settings: DetectionSettings) -> Result<()> {
        settings.validate()?;
        self.config.settings = settings;
        Ok(())
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.config.view_mode = view_mode;
    }

    /// Compose the current frame, or `None` before an image is loaded
    #[must_use]
    pub fn render(&self) -> Option<Overlay> {
        let (width, height) = self.canvas_size()?;
        Some(compose_overlay(&OverlayState {
            width,
            height,
            mask: self.state.mask(),
            view_mode: self.config.view_mode,
            committed: self.committed_selections(),
            live_box: self.state.live_box(),
            scale: self.scale,
        }))
    }

    /// Render and blit onto `surface`; returns false when nothing was drawn
    pub fn render_to<S: CanvasSurface + ?Sized>(&self, surface: &mut S) -> bool {
        match self.render() {
            Some(overlay) => {
                blit(&overlay, surface);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    #[must_use]
    pub fn state_kind(&self) -> StateKind {
        self.state.kind()
    }

    /// Committed selections in canvas space (at most one)
    #[must_use]
    pub fn committed_selections(&self) -> &[SelectionBox] {
        match &self.committed {
            Some(selection) => std::slice::from_ref(selection),
            None => &[],
        }
    }

    #[must_use]
    pub fn removal_config(&self) -> &ObjectRemovalConfig {
        &self.removal
    }

    #[must_use]
    pub fn preview_config(&self) -> &PreviewConfig {
        &self.config
    }

    #[must_use]
    pub fn settings(&self) -> &DetectionSettings {
        &self.config.settings
    }

    #[must_use]
    pub fn scale(&self) -> ImageScale {
        self.scale
    }

    #[must_use]
    pub fn is_image_loaded(&self) -> bool {
        self.image.is_some()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|loaded| loaded.preview.dimensions())
    }

    /// Canvas-sized raster detection runs on
    #[must_use]
    pub fn preview_image(&self) -> Option<&RgbaImage> {
        self.image.as_ref().map(|loaded| loaded.preview.as_ref())
    }

    #[must_use]
    pub fn last_timings(&self) -> Option<&DetectionTimings> {
        self.last_timings.as_ref()
    }
}

fn ensure_display_size(display_size: (u32, u32)) -> Result<()> {
    if display_size.0 == 0 || display_size.1 == 0 {
        return Err(MaskError::config_value_error(
            "display size",
            format!("{}x{}", display_size.0, display_size.1),
            "non-zero width and height",
            None,
        ));
    }
    Ok(())
}

/// Map a canvas-space box from one canvas scale to another through image space
fn rescale_selection(selection: &SelectionBox, from: ImageScale, to: ImageScale) -> SelectionBox {
    SelectionBox::new(
        selection.x * from.scale_x / to.scale_x,
        selection.y * from.scale_y / to.scale_y,
        selection.width * from.scale_x / to.scale_x,
        selection.height * from.scale_y / to.scale_y,
    )
}

fn resize_for_display(source: &RgbaImage, display_size: (u32, u32)) -> RgbaImage {
    if source.dimensions() == display_size {
        source.clone()
    } else {
        image::imageops::resize(source, display_size.0, display_size.1, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        configs: Mutex<Vec<ObjectRemovalConfig>>,
        busy: Mutex<Vec<bool>>,
    }

    impl ConfigListener for Recorder {
        fn on_config_change(&self, config: &ObjectRemovalConfig) {
            self.configs.lock().unwrap().push(config.clone());
        }

        fn on_busy_change(&self, busy: bool) {
            self.busy.lock().unwrap().push(busy);
        }
    }

    fn loaded_session() -> MaskPreviewSession {
        let mut session = MaskPreviewSession::new(PreviewConfig::default());
        let image = RgbaImage::from_pixel(100, 100, Rgba([60, 120, 180, 255]));
        session.load_image(image, (100, 100)).unwrap();
        session
    }

    fn drag(session: &mut MaskPreviewSession, from: (f64, f64), to: (f64, f64)) -> StateKind {
        session.dispatch(SessionEvent::PointerDown(PointerEvent::new(from.0, from.1)));
        session.dispatch(SessionEvent::PointerMove(PointerEvent::new(to.0, to.1)));
        session.dispatch(SessionEvent::PointerUp(PointerEvent::new(to.0, to.1)))
    }

    #[test]
    fn test_pointer_events_ignored_without_image() {
        let mut session = MaskPreviewSession::new(PreviewConfig::default());
        let kind = session.dispatch(SessionEvent::PointerDown(PointerEvent::new(5.0, 5.0)));
        assert_eq!(kind, StateKind::Idle);
        assert!(session.render().is_none());
    }

    #[test]
    fn test_drawing_tracks_live_box() {
        let mut session = loaded_session();
        session.dispatch(SessionEvent::PointerDown(PointerEvent::new(40.0, 40.0)));
        session.dispatch(SessionEvent::PointerMove(PointerEvent::new(10.0, 20.0)));
        assert_eq!(session.state_kind(), StateKind::Drawing);
        assert_eq!(
            session.state().live_box(),
            Some(SelectionBox::new(10.0, 20.0, 30.0, 20.0))
        );
    }

    #[test]
    fn test_small_drag_returns_to_idle() {
        let mut session = loaded_session();
        assert_eq!(drag(&mut session, (10.0, 10.0), (13.0, 13.0)), StateKind::Idle);
        assert!(session.committed_selections().is_empty());
        assert!(session.removal_config().mask.is_none());
    }

    #[test]
    fn test_minimum_side_is_inclusive() {
        let mut session = loaded_session();
        assert_eq!(drag(&mut session, (10.0, 10.0), (15.0, 15.0)), StateKind::Detected);
    }

    #[test]
    fn test_inline_detection_updates_config() {
        let recorder = Arc::new(Recorder::default());
        let mut session = loaded_session().with_listener(recorder.clone());
        assert_eq!(drag(&mut session, (10.0, 10.0), (60.0, 60.0)), StateKind::Detected);

        let config = session.removal_config();
        assert_eq!(config.method, RemovalMethod::PreciseMask);
        assert_eq!(config.detection_settings, Some(DetectionSettings::default()));
        let coords = config.coordinates.unwrap();
        assert_eq!((coords.x, coords.y, coords.width, coords.height), (10, 10, 50, 50));
        assert_eq!(config.mask.as_ref().unwrap().statistics().masked_pixels, 2500);

        assert_eq!(recorder.configs.lock().unwrap().len(), 1);
        assert_eq!(*recorder.busy.lock().unwrap(), vec![true, false]);
        assert!(session.last_timings().is_some());
    }

    #[test]
    fn test_pointer_down_discards_mask_but_keeps_committed_box() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 10.0), (60.0, 60.0));
        session.dispatch(SessionEvent::PointerDown(PointerEvent::new(70.0, 70.0)));
        assert_eq!(session.state_kind(), StateKind::Drawing);
        assert!(session.state().mask().is_none());
        assert_eq!(session.committed_selections().len(), 1);
    }

    #[test]
    fn test_clear_resets_everything_but_settings() {
        let recorder = Arc::new(Recorder::default());
        let mut session = loaded_session().with_listener(recorder.clone());
        session.set_quality(Quality::Premium);
        drag(&mut session, (10.0, 10.0), (60.0, 60.0));

        assert_eq!(session.dispatch(SessionEvent::Clear), StateKind::Idle);
        let config = session.removal_config();
        assert_eq!(config.method, RemovalMethod::BoundingBox);
        assert!(config.coordinates.is_none());
        assert!(config.mask.is_none());
        assert_eq!(config.quality, Some(Quality::Premium));
        assert!(config.detection_settings.is_some());
        assert!(session.committed_selections().is_empty());
        assert_eq!(recorder.configs.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_deferred_detection_round_trip() {
        let mut session = loaded_session().with_mode(DetectionMode::Deferred);
        assert_eq!(drag(&mut session, (10.0, 10.0), (60.0, 60.0)), StateKind::Detecting);
        assert!(session.is_busy());

        // Pointer input is ignored while detecting
        session.dispatch(SessionEvent::PointerDown(PointerEvent::new(1.0, 1.0)));
        assert_eq!(session.state_kind(), StateKind::Detecting);

        let request = session.take_detection_request().unwrap();
        let result = FloodFillDetector.detect(
            &request.image,
            &request.selection,
            &request.settings,
            &NeverCancel,
        );

        let stale = SessionEvent::DetectionFinished {
            id: request.id + 100,
            result: Err(MaskError::detection("late")),
        };
        assert_eq!(session.dispatch(stale), StateKind::Detecting);

        let finished = SessionEvent::DetectionFinished {
            id: request.id,
            result,
        };
        assert_eq!(session.dispatch(finished), StateKind::Detected);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_detection_error_returns_to_idle() {
        let mut session = loaded_session().with_mode(DetectionMode::Deferred);
        drag(&mut session, (10.0, 10.0), (60.0, 60.0));
        let request = session.take_detection_request().unwrap();
        let kind = session.dispatch(SessionEvent::DetectionFinished {
            id: request.id,
            result: Err(MaskError::detection_stage_error("flood_fill", "boom", None)),
        });
        assert_eq!(kind, StateKind::Idle);
        assert!(session.removal_config().mask.is_none());
        assert_eq!(session.committed_selections().len(), 1);
    }

    #[test]
    fn test_resize_is_debounced_and_keeps_removal_config() {
        let recorder = Arc::new(Recorder::default());
        let mut session = loaded_session().with_listener(recorder.clone());
        drag(&mut session, (10.0, 10.0), (60.0, 60.0));
        let detected = session.removal_config().clone();

        let start = Instant::now();
        session.notify_resize((50, 50), start);
        assert!(!session.poll_resize(start).unwrap());
        assert_eq!(session.state_kind(), StateKind::Detected);

        assert!(session
            .poll_resize(start + std::time::Duration::from_millis(100))
            .unwrap());
        assert_eq!(session.canvas_size(), Some((50, 50)));
        assert_eq!(session.scale(), ImageScale::from_sizes((100, 100), (50, 50)));
        assert_eq!(session.state_kind(), StateKind::Idle);
        assert!(session.state().mask().is_none());
        assert_eq!(
            session.committed_selections(),
            &[SelectionBox::new(5.0, 5.0, 25.0, 25.0)]
        );

        assert_eq!(session.removal_config(), &detected);
        assert_eq!(session.removal_config().method, RemovalMethod::PreciseMask);
        assert_eq!(recorder.configs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_resize_to_same_size_is_a_no_op() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 10.0), (60.0, 60.0));
        let start = Instant::now();
        session.notify_resize((100, 100), start);
        assert!(!session
            .poll_resize(start + std::time::Duration::from_millis(100))
            .unwrap());
        assert_eq!(session.state_kind(), StateKind::Detected);
    }

    #[test]
    fn test_loading_new_image_clears_previous_detection() {
        let recorder = Arc::new(Recorder::default());
        let mut session = loaded_session().with_listener(recorder.clone());
        drag(&mut session, (10.0, 10.0), (60.0, 60.0));
        assert_eq!(session.removal_config().method, RemovalMethod::PreciseMask);

        let other = RgbaImage::from_pixel(300, 40, Rgba([10, 10, 10, 255]));
        session.load_image(other, (300, 40)).unwrap();

        assert_eq!(session.state_kind(), StateKind::Idle);
        assert!(session.committed_selections().is_empty());
        let config = session.removal_config();
        assert_eq!(config.method, RemovalMethod::BoundingBox);
        assert!(config.coordinates.is_none());
        assert!(config.mask.is_none());
        assert_eq!(recorder.configs.lock().unwrap().last(), Some(config));
    }

    #[test]
    fn test_render_shows_label_for_committed_box() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 30.0), (60.0, 80.0));
        let overlay = session.render().unwrap();
        assert_eq!(overlay.labels(), vec!["Selection 1"]);
        assert!(overlay.buffer.is_some());
    }

    #[test]
    fn test_update_settings_rejects_out_of_range() {
        let mut session = loaded_session();
        let bad = DetectionSettings {
            smoothing: 9,
            ..DetectionSettings::default()
        };
        assert!(session.update_settings(bad).is_err());
        assert_eq!(session.settings().smoothing, 2);
    }
}

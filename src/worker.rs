//! Background detection worker
//!
//! Runs [`ObjectDetector::detect`] on tokio's blocking pool so a UI loop
//! never waits on a flood fill. Results come back over an mpsc channel and
//! are fed to the session as [`SessionEvent::DetectionFinished`]. Starting a
//! new job cancels the one in flight.

use crate::detection::{DetectionOutcome, ObjectDetector};
use crate::error::Result;
use crate::session::{DetectionRequest, SessionEvent};
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of one submitted request
#[derive(Debug)]
pub struct DetectionResponse {
    pub id: u64,
    pub result: Result<DetectionOutcome>,
}

impl From<DetectionResponse> for SessionEvent {
    fn from(response: DetectionResponse) -> Self {
        SessionEvent::DetectionFinished {
            id: response.id,
            result: response.result,
        }
    }
}

/// Runs one detection at a time on the blocking pool
pub struct DetectionWorker {
    detector: Arc<dyn ObjectDetector>,
    sender: mpsc::Sender<DetectionResponse>,
    current: Option<CancellationToken>,
}

impl DetectionWorker {
    /// Create a worker and the receiver its responses arrive on
    #[must_use]
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<DetectionResponse>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                detector,
                sender,
                current: None,
            },
            receiver,
        )
    }

    /// Start `request`, cancelling any job still running.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn submit(&mut self, request: DetectionRequest) -> JoinHandle<()> {
        self.cancel();

        let token = CancellationToken::new();
        self.current = Some(token.clone());
        let detector = Arc::clone(&self.detector);
        let sender = self.sender.clone();

        tokio::task::spawn_blocking(move || {
            let result =
                detector.detect(&request.image, &request.selection, &request.settings, &token);
            let response = DetectionResponse {
                id: request.id,
                result,
            };
            if sender.blocking_send(response).is_err() {
                debug!("Detection response for request {} dropped, receiver closed", request.id);
            }
        })
    }

    /// Signal cancellation to the job in flight, if any
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    #[must_use]
    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }
}

impl std::fmt::Debug for DetectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionWorker")
            .field("detector", &self.detector.name())
            .field("running", &self.current.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectionSettings, PreviewConfig};
    use crate::detection::{CancellationCheck, FloodFillDetector};
    use crate::error::MaskError;
    use crate::mapping::PointerEvent;
    use crate::session::{DetectionMode, MaskPreviewSession, StateKind};
    use crate::types::SelectionBox;
    use image::{Rgba, RgbaImage};

    /// Blocks until its token is cancelled, then reports cancellation
    struct WaitForCancel;

    impl ObjectDetector for WaitForCancel {
        fn name(&self) -> &'static str {
            "wait-for-cancel"
        }

        fn detect(
            &self,
            _image: &RgbaImage,
            _selection: &SelectionBox,
            _settings: &DetectionSettings,
            cancel: &dyn CancellationCheck,
        ) -> Result<DetectionOutcome> {
            while !cancel.is_cancelled() {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Err(MaskError::Cancelled)
        }
    }

    fn request(id: u64) -> DetectionRequest {
        DetectionRequest {
            id,
            image: Arc::new(RgbaImage::from_pixel(64, 64, Rgba([10, 200, 30, 255]))),
            selection: SelectionBox::new(8.0, 8.0, 32.0, 32.0),
            settings: DetectionSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_submit_reports_result() {
        let (mut worker, mut rx) = DetectionWorker::new(Arc::new(FloodFillDetector), 4);
        worker.submit(request(7)).await.unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, 7);
        let outcome = response.result.unwrap();
        assert_eq!(outcome.mask.statistics().masked_pixels, 32 * 32);
    }

    #[tokio::test]
    async fn test_new_submission_cancels_previous() {
        let (mut worker, mut rx) = DetectionWorker::new(Arc::new(WaitForCancel), 4);
        let first = worker.submit(request(1));
        let second = worker.submit(request(2));

        first.await.unwrap();
        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, 1);
        assert!(response.result.unwrap_err().is_cancelled());

        worker.cancel();
        second.await.unwrap();
        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, 2);
    }

    #[tokio::test]
    async fn test_worker_drives_deferred_session() {
        let mut session =
            MaskPreviewSession::new(PreviewConfig::default()).with_mode(DetectionMode::Deferred);
        session
            .load_image(RgbaImage::from_pixel(64, 64, Rgba([10, 200, 30, 255])), (64, 64))
            .unwrap();
        session.dispatch(SessionEvent::PointerDown(PointerEvent::new(8.0, 8.0)));
        session.dispatch(SessionEvent::PointerUp(PointerEvent::new(40.0, 40.0)));
        assert_eq!(session.state_kind(), StateKind::Detecting);

        let (mut worker, mut rx) = DetectionWorker::new(Arc::new(FloodFillDetector), 1);
        let handle = worker.submit(session.take_detection_request().unwrap());
        handle.await.unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(session.dispatch(response.into()), StateKind::Detected);
        assert!(session.removal_config().mask.is_some());
    }
}

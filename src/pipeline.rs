//! Capture-to-estimator bridge
//!
//! The eye-shape/pupil estimation algorithm is an external collaborator;
//! this module defines the seam it plugs into ([`GazeEstimator`]) and the
//! bridge loop that drives the pull-based capture handshake: arm the
//! capture signal, wait for one frame, run the estimator, enqueue the
//! result for the OSC output worker.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::camera::CapturedFrame;
use crate::osc::{EyeId, EyeResult};
use crate::sync::{CancellationToken, CaptureSignal};

/// Bounded frame wait; also the worst-case cancellation latency.
const FRAME_WAIT: Duration = Duration::from_millis(100);

/// The estimation stage consuming captured frames.
pub trait GazeEstimator: Send {
    /// Process one frame. Returning `None` means no result for this frame
    /// (for example the pupil was not found).
    fn estimate(&mut self, frame: &CapturedFrame) -> Option<EyeResult>;
}

/// Placeholder estimator reporting a centered, open gaze for every frame.
/// Useful for exercising the OSC path against an avatar before a real
/// estimation algorithm is wired in.
#[derive(Debug, Clone, Copy)]
pub struct StaticEstimator {
    eye: EyeId,
}

impl StaticEstimator {
    pub fn new(eye: EyeId) -> Self {
        Self { eye }
    }
}

impl GazeEstimator for StaticEstimator {
    fn estimate(&mut self, _frame: &CapturedFrame) -> Option<EyeResult> {
        Some(EyeResult {
            eye: self.eye,
            blink: false,
            x: 0.0,
            y: 0.0,
        })
    }
}

/// Drives frames from the capture worker through an estimator.
pub struct EstimatorBridge {
    frames: Receiver<CapturedFrame>,
    results: Sender<EyeResult>,
    capture_signal: CaptureSignal,
    cancellation: CancellationToken,
    estimator: Box<dyn GazeEstimator>,
}

impl EstimatorBridge {
    pub fn new(
        frames: Receiver<CapturedFrame>,
        results: Sender<EyeResult>,
        capture_signal: CaptureSignal,
        cancellation: CancellationToken,
        estimator: Box<dyn GazeEstimator>,
    ) -> Self {
        Self {
            frames,
            results,
            capture_signal,
            cancellation,
            estimator,
        }
    }

    /// Bridge loop. Returns only when the cancellation token fires.
    pub fn run(&mut self) {
        loop {
            if self.cancellation.is_cancelled() {
                info!("Exiting estimator bridge");
                return;
            }

            // Ask the capture worker for one frame; re-arming an already
            // armed signal is idempotent, so a timed-out wait below does
            // not stack requests.
            self.capture_signal.request();

            match self.frames.recv_timeout(FRAME_WAIT) {
                Ok(frame) => {
                    if let Some(result) = self.estimator.estimate(&frame) {
                        if self.results.send(result).is_err() {
                            warn!("Result consumer disconnected");
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // Capture worker is gone; hold position until told to stop
                    if self.cancellation.wait_timeout(FRAME_WAIT) {
                        info!("Exiting estimator bridge");
                        return;
                    }
                }
            }
        }
    }
}

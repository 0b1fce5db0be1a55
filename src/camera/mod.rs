//! Camera capture worker
//!
//! Owns the connection lifecycle to a capture source (wired device via the
//! [`device`] seam, or an MJPEG-over-HTTP stream) and delivers frames on
//! demand. The consumer pulls frames by arming a [`CaptureSignal`]; the
//! worker captures exactly one frame per armed request, enqueues it, and
//! clears the signal, so at most one frame is in flight at a time.
//!
//! Connectivity failures never escape [`CameraWorker::run`]: every one is
//! logged, reflected in [`CameraState`], and retried after a bounded wait.
//! The only exit path is cancellation.

pub mod device;
pub mod mjpeg;

use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crossbeam_channel::Sender;
use image::RgbImage;
use tracing::{debug, info, trace, warn};

use crate::error::CaptureError;
use crate::sync::{CancellationToken, CaptureSignal};
use device::{CaptureDevice, DeviceOpener};
use mjpeg::MjpegAssembler;

/// Wait between reconnect attempts. Also protects wired camera firmware
/// from rapid reopen cycles.
pub const RECONNECT_WAIT: Duration = Duration::from_millis(100);

/// How long each loop iteration waits for a capture request before
/// rechecking cancellation.
const CAPTURE_POLL: Duration = Duration::from_millis(20);

/// Read granularity for network streams.
const STREAM_CHUNK: usize = 1024;

/// Between-reads timeout on network streams. Bounds how long a stalled
/// stream can hold the worker in a blocking read before cancellation is
/// rechecked; a stall is not a disconnect.
const STREAM_READ_WAIT: Duration = Duration::from_millis(100);

/// MJPEG streams do not report a rate; assume a nominal one.
const STREAM_NOMINAL_FPS: f32 = 60.0;

/// Suggested bound for the frame channel. Depth stays at or below one under
/// normal pull-based operation; anything above is a backpressure signal.
pub const FRAME_QUEUE_DEPTH: usize = 8;

/// Connection status of the capture worker, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Connecting,
    Connected,
    Disconnected,
}

/// One captured frame plus source metadata.
///
/// `frame_number` wraps per source: wired devices report their own counter,
/// stream sources count frames per connection.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbImage,
    pub frame_number: u64,
    pub fps: f32,
}

/// Capture source kind, resolved from the configured address string once
/// per loop iteration so a concurrent address edit cannot flip the dispatch
/// mid-cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// MJPEG-over-HTTP stream URL
    Http(String),
    /// Wired device identifier (integer index or device path)
    Wired(String),
    /// Nothing configured yet; poll until an address shows up
    Unset,
}

impl CaptureSource {
    pub fn resolve(address: Option<&str>) -> Self {
        match address {
            Some(addr) if addr.contains("http") => Self::Http(addr.to_string()),
            Some(addr) if !addr.is_empty() => Self::Wired(addr.to_string()),
            _ => Self::Unset,
        }
    }
}

/// Shared cell holding the configured capture address. The settings surface
/// writes it; the worker re-reads it every iteration, tolerating a stale
/// read (worst case one extra reconnect cycle).
pub type SharedSource = Arc<RwLock<Option<String>>>;

/// Long-lived capture worker. Runs on its own thread; owns the device or
/// stream handle exclusively.
pub struct CameraWorker {
    source: SharedSource,
    opener: Box<dyn DeviceOpener>,
    http: reqwest::blocking::Client,

    device: Option<Box<dyn CaptureDevice>>,
    stream: Option<Box<dyn Read + Send>>,
    assembler: MjpegAssembler,
    stream_frame_number: u64,

    /// Address the currently held handle was opened at, used to detect
    /// source changes that require releasing it.
    current_source: Option<String>,

    status: CameraState,
    status_tx: Sender<CameraState>,
    frame_tx: Sender<CapturedFrame>,
    capture_signal: CaptureSignal,
    cancellation: CancellationToken,
}

impl CameraWorker {
    pub fn new(
        source: SharedSource,
        opener: Box<dyn DeviceOpener>,
        frame_tx: Sender<CapturedFrame>,
        status_tx: Sender<CameraState>,
        capture_signal: CaptureSignal,
        cancellation: CancellationToken,
    ) -> crate::Result<Self> {
        // No whole-request timeout (the stream is endless); the read timeout
        // bounds each individual read instead.
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(None::<Duration>)
            .read_timeout(STREAM_READ_WAIT)
            .build()
            .map_err(|e| CaptureError::StreamConnect(e.to_string()))?;

        Ok(Self {
            source,
            opener,
            http,
            device: None,
            stream: None,
            assembler: MjpegAssembler::new(),
            stream_frame_number: 0,
            current_source: None,
            status: CameraState::Connecting,
            status_tx,
            frame_tx,
            capture_signal,
            cancellation,
        })
    }

    /// Capture loop. Returns only when the cancellation token fires.
    pub fn run(&mut self) {
        let _ = self.status_tx.send(self.status);

        loop {
            if self.cancellation.is_cancelled() {
                info!("Exiting capture thread");
                self.release_stream();
                self.device = None;
                return;
            }

            let mut should_push = true;

            match CaptureSource::resolve(self.configured_address().as_deref()) {
                CaptureSource::Http(url) => {
                    if self.stream.is_none() || self.current_source.as_deref() != Some(url.as_str())
                    {
                        self.release_stream();
                        self.connect_stream(&url);
                        if self.stream.is_none() {
                            // Still connecting; pace the retry like the
                            // wired path does
                            self.cancellation.wait_timeout(RECONNECT_WAIT);
                            continue;
                        }
                    }
                }
                CaptureSource::Wired(id) => {
                    // Switched over from a stream source; no need to keep it running
                    self.release_stream();

                    let needs_open = self.device.as_ref().map_or(true, |d| !d.is_open())
                        || self.status == CameraState::Disconnected
                        || self.current_source.as_deref() != Some(id.as_str());

                    if needs_open {
                        warn!("Capture source {} not found, retrying", id);
                        // The wait protects camera firmware from rapid reopen cycles
                        if self.cancellation.wait_timeout(RECONNECT_WAIT) {
                            continue;
                        }
                        // Release the old handle before opening the (possibly
                        // different) address
                        self.device = None;
                        self.current_source = Some(id.clone());
                        match self.opener.open(&id) {
                            Ok(dev) => self.device = Some(dev),
                            Err(e) => {
                                debug!("Device open failed: {}", e);
                                self.set_status(CameraState::Disconnected);
                            }
                        }
                        should_push = false;
                    }
                }
                CaptureSource::Unset => {
                    // No capture source to try yet; wait for one to show up
                    // in the settings
                    if self.cancellation.wait_timeout(RECONNECT_WAIT) {
                        self.set_status(CameraState::Disconnected);
                    }
                    continue;
                }
            }

            // Wait for the consumer to request a capture, cycling often
            // enough to keep cancellation responsive under no demand.
            if should_push && !self.capture_signal.wait_timeout(CAPTURE_POLL) {
                continue;
            }

            // A reconnect-cycle iteration never delivers a frame; the armed
            // request (if any) stays pending for the next pass.
            if self.stream.is_some() {
                self.read_stream_frame();
            } else if should_push {
                self.read_device_frame();
            }

            if !should_push && self.device.as_ref().is_some_and(|d| d.is_open()) {
                // Reconnect cycle with a usable handle: consider ourselves
                // connected without requiring a successful frame read
                self.set_status(CameraState::Connected);
            }
        }
    }

    fn configured_address(&self) -> Option<String> {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connect_stream(&mut self, url: &str) {
        match self.http.get(url).send() {
            Ok(response) => {
                self.current_source = Some(url.to_string());
                self.stream = Some(Box::new(response));
                self.set_status(CameraState::Connected);
            }
            Err(e) => {
                debug!("Stream connect failed: {}", e);
                warn!("Capture source {} not found, retrying", url);
            }
        }
    }

    /// Read stream bytes until one complete JPEG frame is decoded, then
    /// push it and return.
    fn read_stream_frame(&mut self) {
        // Frames already buffered by a previous read satisfy this request
        if self.emit_buffered_frame() {
            return;
        }

        let mut chunk = [0u8; STREAM_CHUNK];
        loop {
            if self.cancellation.is_cancelled() {
                return;
            }

            let read = match self.stream.as_mut() {
                Some(stream) => stream.read(&mut chunk),
                None => return,
            };

            match read {
                Ok(0) => {
                    warn!("MJPEG stream ended, reconnecting");
                    self.release_stream();
                    self.set_status(CameraState::Disconnected);
                    return;
                }
                Ok(n) => {
                    self.assembler.extend(&chunk[..n]);
                    if self.emit_buffered_frame() {
                        return;
                    }
                }
                Err(e) if is_read_timeout(&e) => {
                    // No bytes within the read window. The stream may just
                    // be slow; loop back so cancellation gets rechecked.
                    continue;
                }
                Err(e) => {
                    warn!("MJPEG stream read failed: {}", e);
                    self.release_stream();
                    self.set_status(CameraState::Disconnected);
                    return;
                }
            }
        }
    }

    /// Decode and push the next assembled frame, if any. Corrupt slices are
    /// dropped without touching the camera state and the scan continues.
    fn emit_buffered_frame(&mut self) -> bool {
        while let Some(jpg) = self.assembler.next_frame() {
            self.stream_frame_number += 1;
            match image::load_from_memory_with_format(&jpg, image::ImageFormat::Jpeg) {
                Ok(decoded) => {
                    self.push_frame(
                        decoded.to_rgb8(),
                        self.stream_frame_number,
                        STREAM_NOMINAL_FPS,
                    );
                    return true;
                }
                Err(e) => {
                    trace!("Dropping undecodable MJPEG slice: {}", e);
                }
            }
        }
        false
    }

    fn read_device_frame(&mut self) {
        let result = match self.device.as_mut() {
            Some(device) => device.read_frame(),
            None => {
                self.set_status(CameraState::Disconnected);
                return;
            }
        };

        match result {
            Ok(frame) => {
                self.push_frame(frame.image, frame.index, frame.fps);
            }
            Err(e) => {
                // File-backed sources loop back to the start on a failed read
                if let Some(device) = self.device.as_mut() {
                    device.rewind();
                }
                warn!(
                    "Capture source problem, assuming camera disconnected, waiting for reconnect: {}",
                    e
                );
                self.set_status(CameraState::Disconnected);
            }
        }
    }

    fn push_frame(&mut self, image: RgbImage, frame_number: u64, fps: f32) {
        // Depth above one means the estimator is falling behind. Yell, but
        // still enqueue: visibility over dropping.
        let depth = self.frame_tx.len();
        if depth > 1 {
            warn!(
                "Capture queue backpressure of {}; check for a crashed or stalled estimator",
                depth
            );
        }

        if self
            .frame_tx
            .send(CapturedFrame {
                image,
                frame_number,
                fps,
            })
            .is_err()
        {
            warn!("Frame consumer disconnected");
        }

        // The consumer must re-arm before the next frame is delivered
        self.capture_signal.clear();
    }

    fn set_status(&mut self, state: CameraState) {
        if self.status == state {
            return;
        }
        debug!("Camera state: {:?} -> {:?}", self.status, state);
        self.status = state;
        let _ = self.status_tx.send(state);
    }

    fn release_stream(&mut self) {
        if self.stream.is_some() {
            self.stream = None;
            self.assembler.clear();
            self.stream_frame_number = 0;
        }
    }
}

/// Whether a stream read error is the client's between-reads timeout rather
/// than a dead connection. reqwest surfaces its timeout through the io error
/// chain, so the cause chain is walked as well as the io kind.
fn is_read_timeout(e: &std::io::Error) -> bool {
    if matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) {
        return true;
    }

    let mut cause: Option<&(dyn std::error::Error + 'static)> = e.get_ref().map(|e| e as _);
    while let Some(err) = cause {
        if let Some(req) = err.downcast_ref::<reqwest::Error>() {
            return req.is_timeout();
        }
        cause = err.source();
    }
    false
}

//! Wired capture device seam
//!
//! The capture worker talks to wired hardware through [`CaptureDevice`] and
//! opens it through [`DeviceOpener`], so the reconnect state machine never
//! names a backend. The production backend is `nokhwa` (feature `wired`);
//! tests drive the worker with fake devices.

use image::RgbImage;

use crate::error::CaptureError;

/// One frame read from a wired device, with the device-reported frame index
/// and frame rate.
#[derive(Debug, Clone)]
pub struct DeviceFrame {
    pub image: RgbImage,
    pub index: u64,
    pub fps: f32,
}

/// A live handle to a wired capture source.
pub trait CaptureDevice: Send {
    /// Whether the device handle is still usable.
    fn is_open(&self) -> bool;

    /// Blocking read of one frame.
    fn read_frame(&mut self) -> Result<DeviceFrame, CaptureError>;

    /// Reset playback to the start. Supports looping file-backed sources;
    /// a no-op for live cameras.
    fn rewind(&mut self);
}

/// Factory that opens a [`CaptureDevice`] from a configured source string
/// (integer index or platform device path).
pub trait DeviceOpener: Send {
    fn open(&self, source: &str) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// Opener for the platform camera backend.
///
/// Without the `wired` feature every open fails, which the capture worker
/// treats like any other unreachable device: log, bounded wait, retry.
#[derive(Debug, Default)]
pub struct NativeOpener;

#[cfg(feature = "wired")]
mod native {
    use image::RgbImage;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;

    use super::{CaptureDevice, DeviceFrame, DeviceOpener, NativeOpener};
    use crate::error::CaptureError;

    /// Wired camera backed by nokhwa.
    ///
    /// nokhwa does not expose a hardware frame counter, so the index is
    /// counted per opened handle (it resets on reconnect, matching the
    /// per-source wrap behavior of the frame sequence contract).
    pub struct UvcDevice {
        camera: Camera,
        frames_read: u64,
    }

    impl CaptureDevice for UvcDevice {
        fn is_open(&self) -> bool {
            self.camera.is_stream_open()
        }

        fn read_frame(&mut self) -> Result<DeviceFrame, CaptureError> {
            let buffer = self
                .camera
                .frame()
                .map_err(|e| CaptureError::DeviceRead(e.to_string()))?;

            let image: RgbImage = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| CaptureError::Decode(e.to_string()))?;

            self.frames_read += 1;
            Ok(DeviceFrame {
                image,
                index: self.frames_read,
                fps: self.camera.frame_rate() as f32,
            })
        }

        fn rewind(&mut self) {
            // Live cameras cannot seek.
        }
    }

    impl DeviceOpener for NativeOpener {
        fn open(&self, source: &str) -> Result<Box<dyn CaptureDevice>, CaptureError> {
            let index = match source.parse::<u32>() {
                Ok(n) => CameraIndex::Index(n),
                Err(_) => CameraIndex::String(source.to_string()),
            };

            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

            let mut camera = Camera::new(index, requested).map_err(|e| CaptureError::DeviceOpen {
                device: source.to_string(),
                message: e.to_string(),
            })?;

            camera.open_stream().map_err(|e| CaptureError::DeviceOpen {
                device: source.to_string(),
                message: e.to_string(),
            })?;

            tracing::info!("Opened wired capture device: {}", source);

            Ok(Box::new(UvcDevice {
                camera,
                frames_read: 0,
            }))
        }
    }
}

#[cfg(not(feature = "wired"))]
impl DeviceOpener for NativeOpener {
    fn open(&self, source: &str) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        Err(CaptureError::DeviceOpen {
            device: source.to_string(),
            message: "built without wired camera support (enable the `wired` feature)".to_string(),
        })
    }
}

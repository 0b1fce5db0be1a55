//! Irislink - VR Eye Tracking Bridge
//!
//! A concurrent capture-to-OSC pipeline for eye-tracked VR avatars:
//! - Captures eye camera frames from wired devices or MJPEG-over-HTTP streams
//! - Delivers frames on demand through a pull-based capture handshake
//! - Republishes estimator results as VRChat OSC avatar parameters
//! - Optionally listens for recenter/recalibrate commands sent back by the avatar

pub mod camera;
pub mod config;
pub mod error;
pub mod osc;
pub mod pipeline;
pub mod sync;

pub use config::Config;
pub use error::{IrislinkError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

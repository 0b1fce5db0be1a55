//! Error types for Irislink

use thiserror::Error;

/// Main error type for Irislink
#[derive(Error, Debug)]
pub enum IrislinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("OSC error: {0}")]
    Osc(#[from] OscError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Camera capture errors.
///
/// None of these are fatal to the capture worker; every one resolves to a
/// state transition plus a retry on a later loop iteration.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to connect to stream: {0}")]
    StreamConnect(String),

    #[error("Stream read failed: {0}")]
    StreamRead(String),

    #[error("Failed to open capture device '{device}': {message}")]
    DeviceOpen { device: String, message: String },

    #[error("Device read failed: {0}")]
    DeviceRead(String),

    #[error("Frame decode failed: {0}")]
    Decode(String),
}

/// OSC protocol errors
#[derive(Error, Debug)]
pub enum OscError {
    #[error("Failed to bind OSC socket: {0}")]
    Bind(String),

    #[error("Invalid OSC target address: {0}")]
    Target(String),

    #[error("Failed to encode OSC message: {0}")]
    Encode(String),

    #[error("Failed to send OSC message: {0}")]
    Send(String),
}

/// Result type alias for Irislink operations
pub type Result<T> = std::result::Result<T, IrislinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_open_error_names_the_device() {
        let err = CaptureError::DeviceOpen {
            device: "/dev/video9".to_string(),
            message: "busy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open capture device '/dev/video9': busy"
        );
        // The device identifier is plain context, not a nested error
        assert!(std::error::Error::source(&err).is_none());
    }
}

//! Error types for the audio streaming application

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to attach audio device: {0}")]
    AttachFailed(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Wire decoding errors
///
/// Decoding is the only codec direction that can fail; encoding a
/// well-formed packet always succeeds.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown packet type: {0}")]
    UnknownType(u8),

    #[error("truncated packet: needed {expected} bytes, had {available}")]
    Truncated { expected: usize, available: usize },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

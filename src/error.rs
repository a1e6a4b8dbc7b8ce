//! Error types for the audio streaming pipeline

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Thread {0} panicked")]
    ThreadPanicked(&'static str),
}

/// Acquisition channel errors
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enable channel: {0}")]
    EnableFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Channel is not enabled")]
    NotEnabled,

    #[error("Read timed out")]
    Timeout,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Handoff queue errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Still full once the wait budget was spent; the block was dropped
    #[error("Queue full")]
    Full,

    /// The other end of the queue is gone
    #[error("Queue closed")]
    Closed,
}

/// Transport session errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Socket creation failed: {0}")]
    SocketFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Partial datagram: sent {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },

    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

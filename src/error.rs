//! Error types for ulc-session.
//!
//! The three channel errors ([`ConnectError`], [`TransceiveError`],
//! [`CloseError`]) are produced by [`Transceiver`](crate::transport::Transceiver)
//! implementations. The session controller never propagates them; it turns
//! each one into a recorded outcome. [`UlcError`] covers the rest of the
//! library API.

use thiserror::Error;

/// Failure to open the channel to a tag.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Tag left the field (or was never in it).
    #[error("tag lost")]
    TagLost,

    /// Radio or driver reported an error.
    #[error("radio error: {0}")]
    Radio(String),

    /// I/O error from the underlying device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command was sent but no valid response came back.
#[derive(Debug, Error)]
pub enum TransceiveError {
    /// Channel was not connected.
    #[error("not connected")]
    NotConnected,

    /// No response within the transceiver's timeout.
    #[error("timed out waiting for response")]
    Timeout,

    /// Tag left the field mid-exchange.
    #[error("tag lost")]
    TagLost,

    /// Tag answered with a 4-bit NAK (locked or unreadable page, bad argument).
    #[error("tag answered NAK 0x{0:X}")]
    Nak(u8),

    /// Response had an unexpected length.
    #[error("malformed response: expected {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },

    /// Radio or driver reported an error.
    #[error("radio error: {0}")]
    Radio(String),

    /// I/O error from the underlying device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to tear the channel down.
#[derive(Debug, Error)]
pub enum CloseError {
    /// Tag was already gone.
    #[error("tag lost")]
    TagLost,

    /// Radio or driver reported an error.
    #[error("radio error: {0}")]
    Radio(String),

    /// I/O error from the underlying device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty command frame")]
    Empty,

    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("opcode 0x{opcode:02X} expects {expected} bytes, got {actual}")]
    Length {
        opcode: u8,
        expected: usize,
        actual: usize,
    },
}

/// Main error type for the library API outside of a running session.
#[derive(Debug, Error)]
pub enum UlcError {
    /// Invalid session or dispatcher configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Radio adapter stayed disabled past the configured timeout.
    #[error("radio adapter not enabled")]
    AdapterDisabled,

    /// Dispatcher worker is gone.
    #[error("dispatcher closed")]
    DispatcherClosed,

    /// JSON serialization error (report export).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using UlcError.
pub type Result<T> = std::result::Result<T, UlcError>;

//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the controller
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Channel {0} out of range (expected 1..=4)")]
    InvalidChannel(u8),

    #[error("Command too long: {len} bytes (must be under 64)")]
    CommandTooLong { len: usize },

    #[error("Not a query command (missing '?'): {0}")]
    NotAQuery(String),

    #[error("Preamble mismatch: expected {expected:02x?}, got {actual:02x?}")]
    PreambleMismatch { expected: Vec<u8>, actual: Vec<u8> },

    #[error("Response line missing CR/LF terminator: {0:?}")]
    MissingTerminator(String),

    #[error("Connection closed by controller")]
    ConnectionClosed,

    #[error("Device not found: {vendor_id:04x}:{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Unexpected USB endpoint layout: {0}")]
    EndpointMismatch(String),

    #[error("Malformed command: {0:?}")]
    Malformed(String),

    #[error("Bad command arguments: {0}")]
    BadArguments(String),

    #[error("Invalid response from controller: {0:?}")]
    InvalidResponse(String),

    #[error("Closed with unread responses pending: {0:?}")]
    PendingResponses(Vec<String>),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

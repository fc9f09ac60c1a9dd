//! Controller Protocol Communication
//!
//! Implements the line-oriented ASCII protocol of the New Focus 8742
//! four channel Picomotor controller.
//!
//! Commands are written as `[channel]<MNEMONIC>[params][?]` terminated by a
//! carriage return. Queries (mnemonics ending in `?`) are answered with one
//! line terminated by CR/LF. The protocol is strictly half-duplex: a query's
//! answer must be read before the next command is sent.

pub mod command_builder;
pub mod commands;
mod connection;
mod error;
pub mod stream;
pub mod transport;
pub mod usb;

pub use command_builder::format_command;
pub use commands::{Channel, Command, MotorType};
pub use connection::{ChannelSettings, Controller};
pub use error::ProtocolError;
pub use stream::StreamTransport;
pub use transport::Transport;
pub use usb::UsbTransport;

/// Number of motor channels on the controller
pub const NUM_CHANNELS: usize = 4;

/// Commands must be strictly shorter than this (one USB packet)
pub const MAX_COMMAND_LEN: usize = 64;

/// Line terminator appended to every command
pub const EOL_WRITE: &[u8] = b"\r";

/// Line terminator expected on every response
pub const EOL_READ: &[u8] = b"\r\n";

/// Default interval between motion-done polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

//! Transport abstraction
//!
//! A transport carries command lines to the controller and response lines
//! back. Three implementations exist: [`StreamTransport`](super::StreamTransport)
//! (TCP), [`UsbTransport`](super::UsbTransport) (USB bulk endpoints) and
//! [`SimulatedController`](crate::simulator::SimulatedController).

use async_trait::async_trait;

use super::ProtocolError;

/// Line transport to a controller
///
/// Writes and reads are paired by the caller: one `write_line` per command,
/// followed by exactly one `read_line` if the command was a query.
#[async_trait]
pub trait Transport: Send {
    /// Send one command line. The transport appends the line terminator.
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError>;

    /// Receive one response line with its terminator stripped.
    async fn read_line(&mut self) -> Result<String, ProtocolError>;

    /// Release the connection.
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        (**self).write_line(line).await
    }

    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        (**self).read_line().await
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        (**self).close().await
    }
}

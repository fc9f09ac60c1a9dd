//! TCP stream transport
//!
//! The controller's Ethernet interface speaks the ASCII protocol on a
//! telnet-style port. Right after the connection is accepted it sends a
//! fixed 6 byte telnet negotiation preamble, which is consumed and checked
//! before the transport is handed out.

use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, trace};

use super::{ProtocolError, Transport, EOL_READ, EOL_WRITE};

/// Default TCP port of the controller
pub const DEFAULT_PORT: u16 = 23;

/// Telnet option negotiation the controller sends on connect
/// (IAC WILL ECHO, IAC WILL SUPPRESS-GO-AHEAD)
pub const TELNET_PREAMBLE: [u8; 6] = [0xff, 0xfb, 0x01, 0xff, 0xfb, 0x03];

/// Upper bound on a buffered response line before giving up on finding a terminator
const MAX_LINE_LEN: usize = 1024;

/// Codec for CR-terminated commands and CR/LF-terminated responses
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

impl LineCodec {
    fn lossy(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        let Some(newline) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_LINE_LEN {
                let junk = Self::lossy(src);
                src.clear();
                return Err(ProtocolError::MissingTerminator(junk));
            }
            return Ok(None);
        };

        let line = src.split_to(newline + 1);
        if !line.ends_with(EOL_READ) {
            return Err(ProtocolError::MissingTerminator(Self::lossy(&line)));
        }
        let body = &line[..line.len() - EOL_READ.len()];
        String::from_utf8(body.to_vec())
            .map(Some)
            .map_err(|_| ProtocolError::InvalidResponse(Self::lossy(body)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                let partial = Self::lossy(src);
                src.advance(src.len());
                Err(ProtocolError::MissingTerminator(partial))
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(line.len() + EOL_WRITE.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(EOL_WRITE);
        Ok(())
    }
}

/// Transport over a byte stream, normally a TCP connection
pub struct StreamTransport<S = TcpStream> {
    framed: Framed<S, LineCodec>,
}

impl StreamTransport<TcpStream> {
    /// Connect to a controller at `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self, ProtocolError> {
        debug!("Connecting to controller at {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream).await
    }
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Consume the connect preamble from an already open stream
    pub async fn handshake(mut stream: S) -> Result<Self, ProtocolError> {
        let mut preamble = [0u8; TELNET_PREAMBLE.len()];
        stream.read_exact(&mut preamble).await?;
        if preamble != TELNET_PREAMBLE {
            return Err(ProtocolError::PreambleMismatch {
                expected: TELNET_PREAMBLE.to_vec(),
                actual: preamble.to_vec(),
            });
        }
        trace!("Preamble ok");
        Ok(Self {
            framed: Framed::new(stream, LineCodec),
        })
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.framed.send(line.to_owned()).await
    }

    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        match self.framed.next().await {
            Some(line) => line,
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.framed.close().await
    }
}

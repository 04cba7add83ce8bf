//! The boundary between the protocol core and a transport implementation.
//!
//! A transport turns a byte stream into complete protocol lines and raw
//! binary chunks and back. The stream transport frames lines with CRLF;
//! the socket-based transport carries one message per frame. Neither
//! framing concerns the core: it sees [`TransportEvent`]s and emits
//! [`Frame`]s.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Outgoing traffic, ready for the transport to frame and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One protocol line, without its message boundary.
    Line(String),
    /// One raw binary frame.
    Binary(Bytes),
}

/// Inbound traffic and lifecycle notifications from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete protocol line, boundary stripped.
    Line(String),
    /// One raw binary chunk.
    Binary(Bytes),
    /// The connection is established (after any TLS handshake).
    Connected,
    /// The connection is gone.
    Disconnected,
}

/// Transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An established transport able to send outgoing traffic.
///
/// Implementations append their own message boundary to lines and send
/// binary data unframed.
#[async_trait]
pub trait Transport: Send {
    /// Send one protocol line.
    ///
    /// # Errors
    /// Returns an error when the connection is gone.
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Send one raw binary frame.
    ///
    /// # Errors
    /// Returns an error when the connection is gone.
    async fn send_binary(&mut self, data: Bytes) -> Result<(), TransportError>;
}

/// The channel pair a transport implementation is wired to.
///
/// The transport pulls outgoing [`Frame`]s from `frames` and pushes
/// inbound [`TransportEvent`]s into `events`.
#[derive(Debug)]
pub struct TransportLink {
    /// Outgoing frames for the transport to send.
    pub frames: mpsc::UnboundedReceiver<Frame>,
    /// Inbound events for the connection to process.
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

/// Drive a [`Transport`] from a frame channel until it closes or fails.
///
/// # Errors
/// Returns the first send error; queued frames past it are dropped.
pub async fn forward_frames<T: Transport>(
    mut frames: mpsc::UnboundedReceiver<Frame>,
    transport: &mut T,
) -> Result<(), TransportError> {
    while let Some(frame) = frames.recv().await {
        match frame {
            Frame::Line(line) => transport.send_line(&line).await?,
            Frame::Binary(data) => transport.send_binary(data).await?,
        }
    }
    Ok(())
}

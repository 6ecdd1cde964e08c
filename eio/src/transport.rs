use std::io::{Cursor, Read};

use bytes::Bytes;
use eio_core::{ConnParameters, FrameType, PacketType};
use futures::future::BoxFuture;
use http::HeaderMap;
use url::Url;

pub mod channel;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Knows how to open one kind of wire connection to an Engine.IO server.
///
/// [`Transport::dial`] only performs the network level connect (TCP, TLS,
/// HTTP upgrade or the first poll). It does not perform the Engine.IO
/// handshake unless the returned [`Conn`] exposes an [`Opener`].
///
/// A single transport can be shared by many [`Dialer`](crate::Dialer)s and
/// used for concurrent dials.
pub trait Transport: Send + Sync + 'static {
    /// The name sent to the server in the `transport` query parameter,
    /// e.g. "polling" or "websocket"
    fn name(&self) -> &str;

    fn dial(&self, url: &Url, headers: &HeaderMap) -> BoxFuture<'static, Result<Box<dyn Conn>, BoxError>>;
}

/// A raw connection returned by [`Transport::dial`].
///
/// All methods take `&self` so that a read can be pending while a write is
/// in flight. Implementations serialize concurrent reads (or writes)
/// internally.
pub trait Conn: Send + Sync + 'static {
    /// Wait for the next inbound frame
    fn next_reader(&self) -> BoxFuture<'_, Result<Frame, BoxError>>;

    fn send(
        &self,
        frame_type: FrameType,
        packet_type: PacketType,
        payload: Bytes,
    ) -> BoxFuture<'_, Result<(), BoxError>>;

    /// Close the connection. Calling this more than once is not an error.
    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>>;

    /// The self-opening capability of this connection, if it has one.
    ///
    /// Connections whose network handshake already completes the Engine.IO
    /// open return `Some`; the dialer then skips reading an OPEN frame.
    fn opener(&self) -> Option<&dyn Opener> {
        None
    }
}

/// Completes the Engine.IO open as part of the transport's own connect
pub trait Opener: Send + Sync {
    fn open(&self) -> BoxFuture<'_, Result<ConnParameters, BoxError>>;
}

/// The payload reader of a single inbound frame.
///
/// `close` releases whatever the transport holds for this frame. [`Frame`]
/// calls it exactly once.
pub trait FrameReader: Read + Send {
    fn close(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl FrameReader for Cursor<Bytes> {}

/// One inbound frame. The payload reader is closed when the frame is
/// dropped, or explicitly with [`Frame::close`].
pub struct Frame {
    frame_type: FrameType,
    packet_type: PacketType,
    reader: Box<dyn FrameReader>,
    closed: bool,
}

impl Frame {
    pub fn new(frame_type: FrameType, packet_type: PacketType, reader: Box<dyn FrameReader>) -> Self {
        Self {
            frame_type,
            packet_type,
            reader,
            closed: false,
        }
    }

    /// A frame whose payload is already in memory
    pub fn from_bytes(frame_type: FrameType, packet_type: PacketType, data: Bytes) -> Self {
        Self::new(frame_type, packet_type, Box::new(Cursor::new(data)))
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn close(mut self) -> Result<(), BoxError> {
        self.closed = true;
        self.reader.close()
    }
}

impl Read for Frame {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.reader.close() {
            tracing::warn!(err=?e, packet_type=%self.packet_type, "error closing frame reader");
        }
    }
}

/// Point `url` at `transport`, replacing any `transport` key already present
/// and appending `extra` pairs.
#[cfg(any(feature = "tungstenite", feature = "polling"))]
pub(crate) fn transport_url(url: &Url, transport: &str, extra: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "transport" && !extra.iter().any(|(e, _)| k == e))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept);
        pairs.append_pair("transport", transport);
        pairs.extend_pairs(extra);
    }
    url
}

pub(crate) fn closed_error() -> BoxError {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::ConnectionAborted,
        "connection closed",
    ))
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("frame_type", &self.frame_type)
            .field("packet_type", &self.packet_type)
            .finish()
    }
}

//! An in-process transport.
//!
//! A [`ChannelServer`] hands out [`ChannelTransport`]s. Dialing one of them
//! connects to the server over a pair of in-memory queues and completes the
//! Engine.IO open as part of the connect: the session parameters are decided
//! when the connection is created, so no OPEN frame is exchanged. This makes
//! it a self-opening transport (its connections expose an [`Opener`]).
//!
//! ```rust
//! use std::time::Duration;
//! use eio::{Dialer, channel::ChannelServer};
//!
//! # async fn example() {
//! let server = ChannelServer::new(Duration::from_secs(25), Duration::from_secs(60));
//! let dialer = Dialer::build_tokio()
//!     .with_transport(server.transport("channel"))
//!     .build();
//! let conn = dialer.dial("channel://local/").await.unwrap();
//! let peer = server.accept().await.unwrap();
//! assert_eq!(peer.params().sid, conn.id());
//! # }
//! ```
use std::time::Duration;

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use eio_core::{ConnParameters, FrameType, Packet, PacketType};
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use http::HeaderMap;
use url::Url;

use crate::transport::{BoxError, Conn, Frame, Opener, Transport, closed_error};

pub struct ChannelServer {
    tx: Sender<ChannelPeer>,
    rx: Receiver<ChannelPeer>,
    ping_interval: Duration,
    ping_timeout: Duration,
}

impl ChannelServer {
    /// Create a server which hands out the given heartbeat timings to every
    /// session
    pub fn new(ping_interval: Duration, ping_timeout: Duration) -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            tx,
            rx,
            ping_interval,
            ping_timeout,
        }
    }

    /// A transport which connects to this server and reports itself under
    /// `name`
    pub fn transport<S: Into<String>>(&self, name: S) -> ChannelTransport {
        ChannelTransport {
            name: name.into(),
            acceptor: self.tx.clone(),
            ping_interval: self.ping_interval,
            ping_timeout: self.ping_timeout,
        }
    }

    /// Wait for the next client to connect
    pub async fn accept(&self) -> Option<ChannelPeer> {
        self.rx.recv().await.ok()
    }

    /// Stop accepting connections. Later dials fail.
    pub fn close(&self) {
        self.rx.close();
    }
}

#[derive(Clone)]
pub struct ChannelTransport {
    name: String,
    acceptor: Sender<ChannelPeer>,
    ping_interval: Duration,
    ping_timeout: Duration,
}

impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn dial(&self, url: &Url, _headers: &HeaderMap) -> BoxFuture<'static, Result<Box<dyn Conn>, BoxError>> {
        let (to_server_tx, to_server_rx) = async_channel::unbounded();
        let (to_client_tx, to_client_rx) = async_channel::unbounded();
        let params = ConnParameters {
            sid: uuid::Uuid::new_v4().to_string(),
            upgrades: Vec::new(),
            ping_interval: self.ping_interval,
            ping_timeout: self.ping_timeout,
        };
        tracing::trace!(%url, sid = %params.sid, "connecting channel");

        let peer = ChannelPeer {
            params: params.clone(),
            tx: to_client_tx,
            rx: to_server_rx,
        };
        let result = match self.acceptor.try_send(peer) {
            Ok(()) => Ok(Box::new(ChannelConn {
                params,
                tx: to_server_tx,
                rx: to_client_rx,
            }) as Box<dyn Conn>),
            Err(_) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "channel server is not accepting connections",
            )) as BoxError),
        };
        future::ready(result).boxed()
    }
}

/// The client end of a channel connection
struct ChannelConn {
    params: ConnParameters,
    tx: Sender<Packet>,
    rx: Receiver<Packet>,
}

impl Conn for ChannelConn {
    fn next_reader(&self) -> BoxFuture<'_, Result<Frame, BoxError>> {
        async move {
            match self.rx.recv().await {
                Ok(packet) => Ok(Frame::from_bytes(
                    packet.frame_type,
                    packet.packet_type,
                    packet.data,
                )),
                Err(_) => Err(closed_error()),
            }
        }
        .boxed()
    }

    fn send(
        &self,
        frame_type: FrameType,
        packet_type: PacketType,
        payload: Bytes,
    ) -> BoxFuture<'_, Result<(), BoxError>> {
        let result = self
            .tx
            .try_send(Packet::new(frame_type, packet_type, payload))
            .map_err(|_| closed_error());
        future::ready(result).boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        self.tx.close();
        self.rx.close();
        future::ready(Ok(())).boxed()
    }

    fn opener(&self) -> Option<&dyn Opener> {
        Some(self)
    }
}

impl Opener for ChannelConn {
    fn open(&self) -> BoxFuture<'_, Result<ConnParameters, BoxError>> {
        future::ready(Ok(self.params.clone())).boxed()
    }
}

/// The server end of a channel connection
pub struct ChannelPeer {
    params: ConnParameters,
    tx: Sender<Packet>,
    rx: Receiver<Packet>,
}

impl ChannelPeer {
    pub fn params(&self) -> &ConnParameters {
        &self.params
    }

    /// Send a packet to the client. Returns `false` if the client is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.tx.try_send(packet).is_ok()
    }

    /// Receive the next packet from the client, or `None` once the client
    /// has closed the connection
    pub async fn recv(&self) -> Option<Packet> {
        self.rx.recv().await.ok()
    }

    pub fn close(&self) {
        self.tx.close();
        self.rx.close();
    }
}

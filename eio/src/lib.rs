//! An Engine.IO v3 client.
//!
//! A [`Dialer`] is configured with an ordered list of [`Transport`]s. When
//! dialing, the most preferred transport is tried first and the others are
//! fallbacks: a transport that fails to connect, or connects but does not
//! complete the handshake, is closed and the next one is tried. The first
//! transport to complete the handshake produces a [`ClientConnection`],
//! which runs the session's heartbeat and message loop in the background.
//!
//! ## Transports
//!
//! * [`polling::PollingTransport`] (feature `polling`) long-polls over HTTP
//! * [`websocket::WebsocketTransport`] (feature `tungstenite`) uses a websocket
//! * [`channel::ChannelTransport`] connects to an in-process
//!   [`channel::ChannelServer`] and is mostly useful in tests
//!
//! Custom transports implement [`Transport`] and [`Conn`]. A connection whose
//! own connect already completes the Engine.IO open exposes an [`Opener`]
//! from [`Conn::opener`], and the dialer uses that instead of waiting for an
//! OPEN frame.
mod builder;
pub use builder::DialerBuilder;
mod client;
pub use client::{ClientConnection, Message, SendError};
mod conn_finished_reason;
pub use conn_finished_reason::ConnFinishedReason;
mod dial_error;
pub use dial_error::{DialError, HandshakeError};
mod dialer;
pub use dialer::Dialer;
pub mod runtime;
pub mod transport;
pub use transport::{BoxError, Conn, Frame, FrameReader, Opener, Transport, channel};

#[cfg(feature = "polling")]
pub mod polling;
#[cfg(feature = "tungstenite")]
pub mod websocket;

pub use eio_core::{
    ConnParameters, FrameType, Options, Packet, PacketType, TransportType, compose_url,
};

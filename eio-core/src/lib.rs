//! Sans-IO building blocks for an Engine.IO v3 client.
//!
//! This crate has no networking in it. It knows how to encode and decode
//! packets and polling payloads, how to decode the session parameters out of
//! an OPEN packet and how to build the URL a client dials. The `eio` crate
//! drives these over real transports.
mod conn_parameters;
pub use conn_parameters::ConnParameters;
mod options;
pub use options::{Options, TransportType, UnknownTransport};
pub mod packet;
pub use packet::{FrameType, Packet, PacketError, PacketType};
pub mod payload;
mod query;
pub use query::{PROTOCOL_VERSION, PROTOCOL_VERSION_KEY, QueryError, compose_url};

use eio_core::{PacketType, QueryError};

use crate::transport::BoxError;

/// Why a connected transport failed to complete the Engine.IO handshake
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("no handshake frame received: {0}")]
    NoFrame(#[source] BoxError),
    #[error("expected an OPEN packet, got {0}")]
    UnexpectedPacket(PacketType),
    #[error("invalid connection parameters: {0}")]
    InvalidParameters(#[from] serde_json::Error),
    #[error("transport failed to open: {0}")]
    Open(#[source] BoxError),
}

/// Error returned by [`Dialer::dial`](crate::Dialer::dial).
///
/// When every transport fails, the error of the last transport tried (the
/// least preferred one) is returned as is.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[source] url::ParseError),
    #[error("invalid query {query:?}: {reason}")]
    InvalidQuery { query: String, reason: String },
    #[error("no transports configured")]
    NoTransportsConfigured,
    #[error("{transport} transport failed to connect: {source}")]
    TransportDialFailed {
        transport: String,
        #[source]
        source: BoxError,
    },
    #[error("{transport} transport handshake failed: {source}")]
    ProtocolViolation {
        transport: String,
        #[source]
        source: HandshakeError,
    },
}

impl DialError {
    /// The transport this error came from, if it came from one
    pub fn transport(&self) -> Option<&str> {
        match self {
            DialError::TransportDialFailed { transport, .. }
            | DialError::ProtocolViolation { transport, .. } => Some(transport),
            _ => None,
        }
    }
}

impl From<QueryError> for DialError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidUrl(e) => DialError::InvalidUrl(e),
            QueryError::InvalidQuery { query, reason } => DialError::InvalidQuery { query, reason },
        }
    }
}

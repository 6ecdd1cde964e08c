use std::{collections::HashMap, sync::Arc};

use eio_core::{ConnParameters, Options, PacketType, compose_url};
use http::HeaderMap;
use url::Url;

use crate::{
    ClientConnection, DialError, DialerBuilder, HandshakeError,
    runtime::RuntimeHandle,
    transport::{Conn, Transport},
};

pub(crate) type ConnInitializer = Arc<dyn Fn(&ClientConnection) + Send + Sync + 'static>;

/// Dials Engine.IO servers over an ordered list of transports.
///
/// Transports are configured in ascending order of preference, so the last
/// one added is tried first and earlier ones are fallbacks. A `Dialer` holds
/// no per-dial state; it can be cloned and used for concurrent dials.
///
/// # Example
///
/// ```rust,no_run
/// use eio::{Dialer, TransportType};
///
/// # async fn example() {
/// let dialer = Dialer::build_tokio()
///     .with_transport_types(&[TransportType::Polling, TransportType::Websocket])
///     .with_query("token=abc")
///     .build();
/// let conn = dialer.dial("http://localhost:3000/engine.io/").await.unwrap();
/// println!("connected over {} as {}", conn.transport(), conn.id());
/// # }
/// ```
#[derive(Clone)]
pub struct Dialer<R> {
    pub(crate) transports: Vec<Arc<dyn Transport>>,
    pub(crate) headers: HeaderMap,
    pub(crate) query: String,
    pub(crate) auth: HashMap<String, String>,
    pub(crate) options: Options,
    pub(crate) on_connect: Option<ConnInitializer>,
    pub(crate) runtime: R,
}

impl<R> std::fmt::Debug for Dialer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialer")
            .field(
                "transports",
                &self.transports.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("query", &self.query)
            .finish()
    }
}

#[cfg(feature = "tokio")]
impl Dialer<::tokio::runtime::Handle> {
    /// Create a builder for a dialer which spawns connection service loops
    /// onto the current tokio runtime
    ///
    /// # Panics
    ///
    /// If called outside of a tokio runtime
    pub fn build_tokio() -> DialerBuilder<::tokio::runtime::Handle> {
        DialerBuilder::new(::tokio::runtime::Handle::current())
    }
}

impl<R: RuntimeHandle> Dialer<R> {
    pub fn builder(runtime: R) -> DialerBuilder<R> {
        DialerBuilder::new(runtime)
    }

    /// Connect to the Engine.IO server at `url`.
    ///
    /// Each transport is tried in turn, most preferred first, until one
    /// connects and completes the handshake. A transport that fails is
    /// closed before the next one is dialed. If every transport fails the
    /// error from the last one tried is returned.
    #[tracing::instrument(skip(self))]
    pub async fn dial(&self, url: &str) -> Result<ClientConnection, DialError> {
        let url = compose_url(url, &self.query)?;
        if self.transports.is_empty() {
            return Err(DialError::NoTransportsConfigured);
        }

        let mut last_error = None;
        for transport in self.transports.iter().rev() {
            let name = transport.name();
            tracing::debug!(transport = name, %url, "dialing");

            let TransportAttempt { conn, params } =
                match connect(transport.as_ref(), &url, &self.headers).await {
                    Ok(attempt) => attempt,
                    Err(e) => {
                        tracing::warn!(err=%e, "transport failed, trying next");
                        last_error = Some(e);
                        continue;
                    }
                };

            let params = match params {
                Some(params) => params,
                None => match read_handshake(conn.as_ref()).await {
                    Ok(params) => params,
                    Err(source) => {
                        let e = DialError::ProtocolViolation {
                            transport: name.to_string(),
                            source,
                        };
                        tracing::warn!(err=%e, "transport failed, trying next");
                        close_quietly(name, conn).await;
                        last_error = Some(e);
                        continue;
                    }
                },
            };

            tracing::debug!(transport = name, sid = %params.sid, "handshake complete");
            return Ok(self.hand_off(name, conn, params));
        }

        Err(last_error.unwrap_or(DialError::NoTransportsConfigured))
    }

    fn hand_off(&self, transport: &str, conn: Box<dyn Conn>, params: ConnParameters) -> ClientConnection {
        let connection = ClientConnection::spawn(
            &self.runtime,
            transport.to_string(),
            conn,
            params,
            self.auth.clone(),
            &self.options,
        );
        if let Some(on_connect) = &self.on_connect {
            on_connect(&connection);
        }
        connection
    }
}

/// A candidate transport's connection. `params` is set when the transport
/// opened the session itself.
pub(crate) struct TransportAttempt {
    pub(crate) conn: Box<dyn Conn>,
    pub(crate) params: Option<ConnParameters>,
}

/// Dial a single transport and, if its connection can open itself, open it.
pub(crate) async fn connect(
    transport: &dyn Transport,
    url: &Url,
    headers: &HeaderMap,
) -> Result<TransportAttempt, DialError> {
    let name = transport.name();
    let conn = transport
        .dial(url, headers)
        .await
        .map_err(|source| DialError::TransportDialFailed {
            transport: name.to_string(),
            source,
        })?;

    let opened = match conn.opener() {
        Some(opener) => Some(opener.open().await),
        None => None,
    };
    match opened {
        None => Ok(TransportAttempt { conn, params: None }),
        Some(Ok(params)) => Ok(TransportAttempt {
            conn,
            params: Some(params),
        }),
        Some(Err(e)) => {
            close_quietly(name, conn).await;
            Err(DialError::ProtocolViolation {
                transport: name.to_string(),
                source: HandshakeError::Open(e),
            })
        }
    }
}

/// Read the OPEN frame from a connection which does not open itself.
pub(crate) async fn read_handshake(conn: &dyn Conn) -> Result<ConnParameters, HandshakeError> {
    let mut frame = conn.next_reader().await.map_err(HandshakeError::NoFrame)?;
    if frame.packet_type() != PacketType::Open {
        return Err(HandshakeError::UnexpectedPacket(frame.packet_type()));
    }
    let params = ConnParameters::decode(&mut frame)?;
    if let Err(e) = frame.close() {
        tracing::warn!(err=?e, "error closing handshake reader");
    }
    Ok(params)
}

async fn close_quietly(transport: &str, conn: Box<dyn Conn>) {
    if let Err(e) = conn.close().await {
        tracing::warn!(transport, err=?e, "error closing failed connection");
    }
}

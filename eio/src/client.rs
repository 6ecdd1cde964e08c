use std::{collections::HashMap, sync::Mutex};

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use eio_core::{ConnParameters, Options};
use futures::{FutureExt, future::BoxFuture};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    ConnFinishedReason,
    runtime::{JoinError, RuntimeHandle},
    transport::Conn,
};

mod serve;
use serve::{ServeTask, serve};

/// An application message carried in a MESSAGE packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Message::Binary(data)
    }
}

/// Returned by [`ClientConnection::send`] once the session has ended. Holds
/// the message that could not be sent.
#[derive(Debug, thiserror::Error)]
#[error("connection closed")]
pub struct SendError(pub Message);

/// An established Engine.IO session
///
/// This is returned by [`Dialer::dial`](crate::Dialer::dial) once a
/// transport has completed the handshake. A background service loop owns
/// the raw connection: it sends heartbeats, forwards inbound messages to
/// [`ClientConnection::recv`] and writes messages queued with
/// [`ClientConnection::send`].
///
/// Use [`ClientConnection::close`] to end the session. Closing is idempotent
/// and wakes every [`ClientConnection::closed`] waiter. Use
/// [`ClientConnection::join`] to wait for the service loop to stop and find
/// out why it stopped.
///
/// Dropping a `ClientConnection` closes the session.
pub struct ClientConnection {
    transport: String,
    params: ConnParameters,
    auth: HashMap<String, String>,
    outbound: Sender<Message>,
    inbound: Receiver<Message>,
    token: CancellationToken,
    task: Mutex<Option<BoxFuture<'static, ConnFinishedReason>>>,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("sid", &self.params.sid)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ClientConnection {
    /// Take ownership of a connection which has completed the handshake and
    /// start its service loop on `runtime`.
    pub(crate) fn spawn<R: RuntimeHandle>(
        runtime: &R,
        transport: String,
        conn: Box<dyn Conn>,
        params: ConnParameters,
        auth: HashMap<String, String>,
        options: &Options,
    ) -> Self {
        let (outbound_tx, outbound_rx) = async_channel::unbounded();
        let (inbound_tx, inbound_rx) = async_channel::unbounded();
        let token = CancellationToken::new();

        let ping_interval = if params.ping_interval.is_zero() {
            options.ping_interval
        } else {
            params.ping_interval
        };
        let ping_timeout = if params.ping_timeout.is_zero() {
            options.ping_timeout
        } else {
            params.ping_timeout
        };

        let span = tracing::info_span!("eio_client", sid=%params.sid, %transport);
        let join = runtime.spawn(
            serve(
                runtime.clone(),
                ServeTask {
                    conn,
                    ping_interval,
                    ping_timeout,
                    token: token.clone(),
                    inbound: inbound_tx,
                    outbound: outbound_rx,
                },
            )
            .instrument(span),
        );
        let task = async move {
            match join.await {
                Ok(reason) => reason,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    tracing::warn!(err=%e, "connection service loop was cancelled");
                    ConnFinishedReason::Aborted
                }
            }
        }
        .boxed();

        Self {
            transport,
            params,
            auth,
            outbound: outbound_tx,
            inbound: inbound_rx,
            token,
            task: Mutex::new(Some(task)),
        }
    }

    /// The session id the server assigned
    pub fn id(&self) -> &str {
        &self.params.sid
    }

    /// The name of the transport the session was negotiated on
    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn params(&self) -> &ConnParameters {
        &self.params
    }

    /// The auth data the dialer was configured with, for protocols layered
    /// on top of this session to present to the server
    pub fn auth(&self) -> &HashMap<String, String> {
        &self.auth
    }

    /// Queue a message for the service loop to send.
    ///
    /// Fails once the session has ended.
    pub fn send(&self, msg: impl Into<Message>) -> Result<(), SendError> {
        self.outbound
            .try_send(msg.into())
            .map_err(|e| SendError(e.into_inner()))
    }

    /// Wait for the next inbound message. Returns `None` once the session has
    /// ended and every buffered message has been received.
    pub async fn recv(&self) -> Option<Message> {
        self.inbound.recv().await.ok()
    }

    /// Ask the service loop to end the session. Calling this more than once
    /// has no further effect.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!(sid=%self.params.sid, "closing connection");
        }
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future which resolves once the session is closed, whichever side
    /// closed it. Resolves immediately if it is already closed.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.token.clone();
        async move { token.cancelled().await }
    }

    /// Wait for the service loop to stop and return why it stopped.
    ///
    /// This does not close the session; see [`ClientConnection::shutdown`].
    pub async fn join(mut self) -> ConnFinishedReason {
        let task = match self.task.get_mut() {
            Ok(task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match task {
            Some(task) => task.await,
            None => ConnFinishedReason::Aborted,
        }
    }

    /// Close the session and wait for the service loop to stop
    pub async fn shutdown(self) -> ConnFinishedReason {
        self.close();
        self.join().await
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

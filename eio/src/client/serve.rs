use std::{io::Read, time::Duration};

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use eio_core::{FrameType, PacketType};
use futures::{
    FutureExt,
    future::{Fuse, FusedFuture},
};
use tokio_util::sync::CancellationToken;

use crate::{
    ConnFinishedReason,
    client::Message,
    runtime::RuntimeHandle,
    transport::{Conn, Frame},
};

pub(crate) struct ServeTask {
    pub(crate) conn: Box<dyn Conn>,
    pub(crate) ping_interval: Duration,
    pub(crate) ping_timeout: Duration,
    pub(crate) token: CancellationToken,
    pub(crate) inbound: Sender<Message>,
    pub(crate) outbound: Receiver<Message>,
}

impl std::fmt::Debug for ServeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeTask")
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .finish()
    }
}

// The service loop owns the raw connection for the rest of the session.
// Whatever ends the loop, both message queues are closed before the
// termination token is cancelled, and the connection is closed before the
// reason is reported.
pub(crate) async fn serve<R: RuntimeHandle>(runtime: R, task: ServeTask) -> ConnFinishedReason {
    let ServeTask {
        conn,
        ping_interval,
        ping_timeout,
        token,
        inbound,
        outbound,
    } = task;

    let reason = drive(
        &runtime,
        conn.as_ref(),
        ping_interval,
        ping_timeout,
        &token,
        &inbound,
        &outbound,
    )
    .await;
    tracing::debug!(%reason, "connection finished");

    inbound.close();
    outbound.close();
    token.cancel();
    if let Err(e) = conn.close().await {
        tracing::warn!(err=?e, "error closing connection");
    }
    reason
}

async fn drive<R: RuntimeHandle>(
    runtime: &R,
    conn: &dyn Conn,
    ping_interval: Duration,
    ping_timeout: Duration,
    token: &CancellationToken,
    inbound: &Sender<Message>,
    outbound: &Receiver<Message>,
) -> ConnFinishedReason {
    // The pending read survives across iterations so that a ping or an
    // outbound message never drops a half-received frame.
    let read = conn.next_reader().fuse();
    let ping = runtime.sleep(ping_interval).fuse();
    let pong_deadline: Fuse<R::Sleep> = Fuse::terminated();
    futures::pin_mut!(read, ping, pong_deadline);

    loop {
        futures::select! {
            _ = token.cancelled().fuse() => {
                tracing::debug!("close requested");
                break ConnFinishedReason::WeDisconnected;
            },
            _ = ping => {
                tracing::trace!("sending ping");
                if let Err(e) = conn.send(FrameType::Text, PacketType::Ping, Bytes::new()).await {
                    tracing::error!(err=?e, "error sending ping, closing connection");
                    break ConnFinishedReason::ErrorSending(e.to_string());
                }
                if pong_deadline.is_terminated() {
                    pong_deadline.set(runtime.sleep(ping_timeout).fuse());
                }
                ping.set(runtime.sleep(ping_interval).fuse());
            },
            _ = pong_deadline => {
                tracing::warn!(?ping_timeout, "no pong received, closing connection");
                break ConnFinishedReason::Timeout;
            },
            frame = read => {
                let mut frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(err=?e, "error receiving, closing connection");
                        break ConnFinishedReason::ErrorReceiving(e.to_string());
                    }
                };
                read.set(conn.next_reader().fuse());
                tracing::trace!(?frame, "received frame");

                match frame.packet_type() {
                    PacketType::Pong => pong_deadline.set(Fuse::terminated()),
                    PacketType::Ping => {
                        let mut payload = Vec::new();
                        if let Err(e) = frame.read_to_end(&mut payload) {
                            tracing::warn!(err=?e, "error reading ping payload");
                        }
                        drop(frame);
                        if let Err(e) = conn.send(FrameType::Text, PacketType::Pong, payload.into()).await {
                            tracing::error!(err=?e, "error sending pong, closing connection");
                            break ConnFinishedReason::ErrorSending(e.to_string());
                        }
                    }
                    PacketType::Message => match read_message(frame) {
                        Ok(msg) => {
                            // The receiver is gone once the ClientConnection
                            // is dropped, which also cancels the token.
                            let _ = inbound.try_send(msg);
                        }
                        Err(e) => tracing::warn!(err=?e, "dropping unreadable message"),
                    },
                    PacketType::Close => {
                        tracing::debug!("server closed the session");
                        break ConnFinishedReason::TheyDisconnected;
                    }
                    PacketType::Noop => {}
                    other => tracing::warn!(packet_type=%other, "ignoring unexpected packet"),
                }
            },
            next_outbound = outbound.recv().fuse() => {
                let Ok(msg) = next_outbound else {
                    tracing::debug!("connection handle dropped");
                    break ConnFinishedReason::WeDisconnected;
                };
                let (frame_type, payload) = match msg {
                    Message::Text(text) => (FrameType::Text, Bytes::from(text)),
                    Message::Binary(data) => (FrameType::Binary, data),
                };
                if let Err(e) = conn.send(frame_type, PacketType::Message, payload).await {
                    tracing::error!(err=?e, "error sending, closing connection");
                    break ConnFinishedReason::ErrorSending(e.to_string());
                }
            },
        }
    }
}

fn read_message(mut frame: Frame) -> std::io::Result<Message> {
    let mut data = Vec::new();
    frame.read_to_end(&mut data)?;
    match frame.frame_type() {
        FrameType::Text => String::from_utf8(data)
            .map(Message::Text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        FrameType::Binary => Ok(Message::Binary(data.into())),
    }
}

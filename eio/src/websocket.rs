use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use eio_core::{FrameType, Packet, PacketType};
use futures::{
    FutureExt, SinkExt, StreamExt,
    future::BoxFuture,
    lock::Mutex,
    stream::{SplitSink, SplitStream},
};
use http::HeaderMap;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tungstenite::{Message, client::IntoClientRequest};
use url::Url;

use crate::transport::{BoxError, Conn, Frame, Transport, closed_error, transport_url};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] which connects over a websocket using `tokio-tungstenite`
///
/// `http` and `https` URLs are rewritten to `ws` and `wss`. The server is
/// expected to send its OPEN packet as the first websocket message.
#[derive(Debug, Default, Clone)]
pub struct WebsocketTransport;

impl WebsocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebsocketTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    fn dial(&self, url: &Url, headers: &HeaderMap) -> BoxFuture<'static, Result<Box<dyn Conn>, BoxError>> {
        let url = transport_url(url, self.name(), &[]);
        connect_websocket(url, headers.clone()).boxed()
    }
}

async fn connect_websocket(mut url: Url, headers: HeaderMap) -> Result<Box<dyn Conn>, BoxError> {
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|()| format!("cannot use {url} as a websocket url"))?;
    }

    let mut request = url.as_str().into_client_request()?;
    request.headers_mut().extend(headers);
    tracing::debug!(%url, "connecting websocket");
    let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
    let (sink, stream) = ws.split();
    Ok(Box::new(WebsocketConn {
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
        closed: AtomicBool::new(false),
    }))
}

struct WebsocketConn {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: AtomicBool,
}

impl WebsocketConn {
    async fn read_frame(&self) -> Result<Frame, BoxError> {
        let mut stream = self.stream.lock().await;
        loop {
            let packet = match stream.next().await {
                Some(Ok(Message::Text(text))) => Packet::decode_text(text.as_str())?,
                Some(Ok(Message::Binary(data))) => Packet::decode_binary(&data)?,
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(closed_error()),
                Some(Err(e)) => return Err(Box::new(e)),
            };
            return Ok(Frame::from_bytes(
                packet.frame_type,
                packet.packet_type,
                packet.data,
            ));
        }
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), BoxError> {
        let msg = match packet.frame_type {
            FrameType::Text => Message::Text(packet.encode_text()?.into()),
            FrameType::Binary => Message::Binary(packet.encode_binary().into()),
        };
        self.sink.lock().await.send(msg).await?;
        Ok(())
    }

    async fn close_socket(&self) -> Result<(), BoxError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.sink.lock().await.close().await?;
        Ok(())
    }
}

impl Conn for WebsocketConn {
    fn next_reader(&self) -> BoxFuture<'_, Result<Frame, BoxError>> {
        self.read_frame().boxed()
    }

    fn send(
        &self,
        frame_type: FrameType,
        packet_type: PacketType,
        payload: Bytes,
    ) -> BoxFuture<'_, Result<(), BoxError>> {
        self.write_packet(Packet::new(frame_type, packet_type, payload))
            .boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        self.close_socket().boxed()
    }
}

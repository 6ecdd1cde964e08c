use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use eio_core::{
    ConnParameters, FrameType, Packet, PacketType,
    payload::{decode_payload, encode_payload},
};
use futures::{FutureExt, future::BoxFuture, lock::Mutex};
use http::{HeaderMap, HeaderValue, header::CONTENT_TYPE};
use url::Url;

use crate::transport::{BoxError, Conn, Frame, Transport, closed_error, transport_url};

/// A [`Transport`] which long-polls the server over HTTP using `reqwest`
///
/// Binary packets are exchanged base64 encoded (`b64=1`), so every request
/// and response body is a text payload.
///
/// The first poll is made when dialing, so an unreachable server fails the
/// dial rather than the handshake. Once the server's OPEN packet has been
/// seen its session id is attached to every later request.
#[derive(Debug, Clone, Default)]
pub struct PollingTransport {
    client: reqwest::Client,
}

impl PollingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured `reqwest` client, e.g. one with proxy or TLS
    /// settings
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for PollingTransport {
    fn name(&self) -> &str {
        "polling"
    }

    fn dial(&self, url: &Url, headers: &HeaderMap) -> BoxFuture<'static, Result<Box<dyn Conn>, BoxError>> {
        let url = transport_url(url, self.name(), &[("b64", "1")]);
        connect_polling(self.client.clone(), url, headers.clone()).boxed()
    }
}

async fn connect_polling(
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
) -> Result<Box<dyn Conn>, BoxError> {
    tracing::debug!(%url, "starting long-poll");
    let packets = poll(&client, &url, &headers).await?;

    let sid = packets
        .iter()
        .find(|p| p.packet_type == PacketType::Open)
        .and_then(|open| ConnParameters::decode(&open.data[..]).ok())
        .map(|params| params.sid);
    let url = match sid {
        Some(sid) => transport_url(&url, "polling", &[("b64", "1"), ("sid", sid.as_str())]),
        None => url,
    };

    Ok(Box::new(PollingConn {
        client,
        url,
        headers,
        queue: Mutex::new(packets.into_iter().collect()),
        closed: AtomicBool::new(false),
    }))
}

async fn poll(client: &reqwest::Client, url: &Url, headers: &HeaderMap) -> Result<Vec<Packet>, BoxError> {
    let response = client
        .get(url.clone())
        .headers(headers.clone())
        .send()
        .await?
        .error_for_status()?;
    let body = response.text().await?;
    tracing::trace!(bytes = body.len(), "poll returned");
    Ok(decode_payload(&body)?)
}

struct PollingConn {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    queue: Mutex<VecDeque<Packet>>,
    closed: AtomicBool,
}

impl PollingConn {
    async fn read_frame(&self) -> Result<Frame, BoxError> {
        let mut queue = self.queue.lock().await;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(closed_error());
            }
            if let Some(packet) = queue.pop_front() {
                return Ok(Frame::from_bytes(
                    packet.frame_type,
                    packet.packet_type,
                    packet.data,
                ));
            }
            let packets = poll(&self.client, &self.url, &self.headers).await?;
            queue.extend(packets);
        }
    }

    async fn post(&self, packets: &[Packet]) -> Result<(), BoxError> {
        let body = encode_payload(packets)?;
        self.client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain;charset=UTF-8"),
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), BoxError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        self.post(&[packet]).await
    }

    async fn close_session(&self) -> Result<(), BoxError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.post(&[Packet::text(PacketType::Close, "")]).await
    }
}

impl Conn for PollingConn {
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
        self.close_session().boxed()
    }
}

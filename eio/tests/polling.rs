use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use eio::{Dialer, Message, Packet, PacketType, polling::PollingTransport};
use eio_core::{
    ConnParameters,
    payload::{decode_payload, encode_payload},
};
use tokio::sync::Notify;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A minimal long-polling server. The handshake GET answers with an OPEN
/// packet, later GETs wait for queued packets and POSTed MESSAGE packets
/// are echoed back.
#[derive(Default)]
struct PollServer {
    outgoing: Mutex<Vec<Packet>>,
    ready: Notify,
    received: Mutex<Vec<Packet>>,
    requests: Mutex<Vec<HashMap<String, String>>>,
    handshake_headers: Mutex<Option<HeaderMap>>,
}

impl PollServer {
    fn push(&self, packet: Packet) {
        self.outgoing.lock().unwrap().push(packet);
        self.ready.notify_one();
    }

    fn take(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.outgoing.lock().unwrap())
    }

    fn received(&self) -> Vec<Packet> {
        self.received.lock().unwrap().clone()
    }
}

async fn poll(
    State(server): State<Arc<PollServer>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> String {
    server.requests.lock().unwrap().push(query.clone());
    if !query.contains_key("sid") {
        *server.handshake_headers.lock().unwrap() = Some(headers);
        let params = ConnParameters {
            sid: "poll-sid".to_string(),
            upgrades: vec!["websocket".to_string()],
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
        };
        let json = String::from_utf8(params.encode().unwrap()).unwrap();
        return encode_payload(&[Packet::text(PacketType::Open, json)]).unwrap();
    }

    let mut packets = server.take();
    if packets.is_empty() {
        let _ = tokio::time::timeout(Duration::from_millis(500), server.ready.notified()).await;
        packets = server.take();
    }
    if packets.is_empty() {
        packets.push(Packet::text(PacketType::Noop, ""));
    }
    encode_payload(&packets).unwrap()
}

async fn post(State(server): State<Arc<PollServer>>, body: String) -> &'static str {
    for packet in decode_payload(&body).unwrap() {
        if packet.packet_type == PacketType::Message {
            let text = String::from_utf8(packet.data.to_vec()).unwrap();
            server.push(Packet::text(PacketType::Message, format!("echo: {text}")));
        }
        server.received.lock().unwrap().push(packet);
    }
    "ok"
}

async fn start_server() -> (String, Arc<PollServer>) {
    let server = Arc::new(PollServer::default());
    let app = Router::new()
        .route("/engine.io/", get(poll).post(post))
        .with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/engine.io/"), server)
}

#[tokio::test]
async fn handshakes_and_echoes_over_polling() {
    init_logging();
    let (url, server) = start_server().await;
    let dialer = Dialer::build_tokio()
        .with_transport(PollingTransport::new())
        .with_header(
            http::HeaderName::from_static("x-test"),
            http::HeaderValue::from_static("yes"),
        )
        .with_query("token=abc")
        .build();

    let conn = dialer.dial(&url).await.unwrap();
    assert_eq!(conn.transport(), "polling");
    assert_eq!(conn.id(), "poll-sid");
    assert_eq!(conn.params().upgrades, vec!["websocket".to_string()]);

    let handshake = server.requests.lock().unwrap()[0].clone();
    assert_eq!(handshake.get("EIO").map(String::as_str), Some("3"));
    assert_eq!(handshake.get("transport").map(String::as_str), Some("polling"));
    assert_eq!(handshake.get("b64").map(String::as_str), Some("1"));
    assert_eq!(handshake.get("token").map(String::as_str), Some("abc"));
    let headers = server.handshake_headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers.get("x-test").unwrap(), "yes");

    conn.send("hello").unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("no echo");
    assert_eq!(reply, Some(Message::Text("echo: hello".into())));

    conn.shutdown().await;
    let received = server.received();
    assert!(received.iter().any(|p| p.packet_type == PacketType::Close));

    let later = server.requests.lock().unwrap().clone();
    assert!(
        later[1..]
            .iter()
            .all(|q| q.get("sid").map(String::as_str) == Some("poll-sid"))
    );
}

#[cfg(feature = "tungstenite")]
#[tokio::test]
async fn default_transports_fall_back_to_polling() {
    init_logging();
    let (url, _server) = start_server().await;
    // The polling server does not speak websocket, so the preferred
    // transport fails its upgrade and polling takes over
    let dialer = Dialer::build_tokio()
        .with_transport_types(&[eio::TransportType::Polling, eio::TransportType::Websocket])
        .build();

    let conn = dialer.dial(&url).await.unwrap();
    assert_eq!(conn.transport(), "polling");
    conn.shutdown().await;
}

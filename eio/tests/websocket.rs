use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use eio::{
    DialError, Dialer, HandshakeError, Message, PacketType, channel::ChannelServer,
    websocket::WebsocketTransport,
};
use eio_core::ConnParameters;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{
    self,
    handshake::server::{ErrorResponse, Request, Response},
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn open_message(sid: &str) -> tungstenite::Message {
    let params = ConnParameters {
        sid: sid.to_string(),
        upgrades: Vec::new(),
        ping_interval: Duration::from_secs(25),
        ping_timeout: Duration::from_secs(60),
    };
    let json = String::from_utf8(params.encode().unwrap()).unwrap();
    tungstenite::Message::Text(format!("0{json}").into())
}

/// A single-connection websocket server. It sends `first` as soon as the
/// connection is up and then echoes every MESSAGE packet back. The request
/// URI is stored in the returned slot.
async fn serve_once(first: tungstenite::Message) -> (String, Arc<Mutex<Option<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let uri = Arc::new(Mutex::new(None));
    let seen = uri.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| {
            *seen.lock().unwrap() = Some(req.uri().to_string());
            Ok::<_, ErrorResponse>(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        ws.send(first).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let tungstenite::Message::Text(text) = msg {
                if text.as_str().starts_with('4') {
                    ws.send(tungstenite::Message::Text(text)).await.unwrap();
                }
            }
        }
    });

    (format!("http://{addr}/engine.io/"), uri)
}

#[tokio::test]
async fn connects_and_echoes_over_websocket() {
    init_logging();
    let (url, uri) = serve_once(open_message("ws-sid")).await;
    let dialer = Dialer::build_tokio()
        .with_transport(WebsocketTransport::new())
        .build();

    let conn = dialer.dial(&url).await.unwrap();
    assert_eq!(conn.transport(), "websocket");
    assert_eq!(conn.id(), "ws-sid");

    let requested = uri.lock().unwrap().clone().unwrap();
    assert!(requested.starts_with("/engine.io/?"));
    assert!(requested.contains("EIO=3"));
    assert!(requested.contains("transport=websocket"));

    conn.send("hello").unwrap();
    assert_eq!(conn.recv().await, Some(Message::Text("hello".into())));
    conn.shutdown().await;
}

#[tokio::test]
async fn non_open_greeting_is_rejected() {
    init_logging();
    let (url, _uri) = serve_once(tungstenite::Message::Text("4surprise".into())).await;
    let dialer = Dialer::build_tokio()
        .with_transport(WebsocketTransport::new())
        .build();

    let err = dialer.dial(&url).await.unwrap_err();
    match err {
        DialError::ProtocolViolation { transport, source } => {
            assert_eq!(transport, "websocket");
            assert!(matches!(
                source,
                HandshakeError::UnexpectedPacket(PacketType::Message)
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_websocket_falls_back() {
    init_logging();
    // Bind and drop a listener to find a port nothing is listening on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let server = ChannelServer::new(Duration::from_secs(25), Duration::from_secs(60));
    let dialer = Dialer::build_tokio()
        .with_transport(server.transport("fallback"))
        .with_transport(WebsocketTransport::new())
        .build();

    let conn = dialer
        .dial(&format!("http://{addr}/engine.io/"))
        .await
        .unwrap();
    assert_eq!(conn.transport(), "fallback");
    conn.shutdown().await;
}

#![cfg(feature = "tokio")]

use std::time::Duration;

use bytes::Bytes;
use eio::{
    ClientConnection, ConnFinishedReason, DialError, Dialer, FrameType, Message, Packet, PacketType,
    channel::{ChannelPeer, ChannelServer},
};

const URL: &str = "channel://local/";

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn connect(server: &ChannelServer) -> (ClientConnection, ChannelPeer) {
    let dialer = Dialer::build_tokio()
        .with_transport(server.transport("channel"))
        .build();
    let conn = dialer.dial(URL).await.unwrap();
    let peer = server.accept().await.unwrap();
    (conn, peer)
}

// Receive from the peer, skipping heartbeats
async fn recv_non_ping(peer: &ChannelPeer) -> Option<Packet> {
    loop {
        match peer.recv().await {
            Some(p) if p.packet_type == PacketType::Ping => continue,
            other => return other,
        }
    }
}

fn quiet_server() -> ChannelServer {
    ChannelServer::new(Duration::from_secs(25), Duration::from_secs(60))
}

#[tokio::test]
async fn self_opens_with_server_parameters() {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    assert_eq!(conn.transport(), "channel");
    assert_eq!(conn.params(), peer.params());
    assert_eq!(conn.params().ping_interval, Duration::from_secs(25));
    conn.shutdown().await;
}

#[tokio::test]
async fn exchanges_text_and_binary_messages() -> eyre::Result<()> {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    assert!(peer.send(Packet::text(PacketType::Message, "hello")));
    assert_eq!(conn.recv().await, Some(Message::Text("hello".into())));

    assert!(peer.send(Packet::new(
        FrameType::Binary,
        PacketType::Message,
        vec![1u8, 2, 3]
    )));
    assert_eq!(
        conn.recv().await,
        Some(Message::Binary(Bytes::from_static(&[1, 2, 3])))
    );

    conn.send("hi")?;
    let packet = recv_non_ping(&peer).await.unwrap();
    assert_eq!(packet, Packet::text(PacketType::Message, "hi"));

    conn.send(Bytes::from_static(b"\x00\xff"))?;
    let packet = recv_non_ping(&peer).await.unwrap();
    assert_eq!(packet.frame_type, FrameType::Binary);
    assert_eq!(&packet.data[..], b"\x00\xff");

    conn.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn pings_and_stays_up_while_ponged() {
    init_logging();
    let server = ChannelServer::new(Duration::from_millis(20), Duration::from_millis(200));
    let (conn, peer) = connect(&server).await;

    for _ in 0..5 {
        let ping = peer.recv().await.unwrap();
        assert_eq!(ping.packet_type, PacketType::Ping);
        assert!(peer.send(Packet::text(PacketType::Pong, "")));
    }
    assert!(!conn.is_closed());
    assert_eq!(conn.shutdown().await, ConnFinishedReason::WeDisconnected);
}

#[tokio::test]
async fn times_out_without_pong() {
    init_logging();
    let server = ChannelServer::new(Duration::from_millis(20), Duration::from_millis(60));
    let (conn, peer) = connect(&server).await;

    let closed = conn.closed();
    let reason = tokio::time::timeout(Duration::from_secs(5), conn.join())
        .await
        .expect("service loop never stopped");
    assert_eq!(reason, ConnFinishedReason::Timeout);
    closed.await;

    // The client side of the channel is closed, drain the pings
    while peer.recv().await.is_some() {}
}

#[tokio::test]
async fn replies_to_server_ping_with_same_payload() {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    assert!(peer.send(Packet::text(PacketType::Ping, "probe")));
    let pong = peer.recv().await.unwrap();
    assert_eq!(pong, Packet::text(PacketType::Pong, "probe"));
    conn.shutdown().await;
}

#[tokio::test]
async fn close_is_idempotent_and_wakes_every_waiter() {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    let first = tokio::spawn(conn.closed());
    let second = tokio::spawn(conn.closed());

    conn.close();
    conn.close();
    assert!(conn.is_closed());

    first.await.unwrap();
    second.await.unwrap();
    // Already closed, resolves immediately
    conn.closed().await;

    assert_eq!(conn.join().await, ConnFinishedReason::WeDisconnected);
    assert!(recv_non_ping(&peer).await.is_none());
}

#[tokio::test]
async fn server_close_packet_ends_the_session() {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    assert!(peer.send(Packet::text(PacketType::Message, "bye")));
    assert!(peer.send(Packet::text(PacketType::Close, "")));

    conn.closed().await;
    assert!(conn.send("too late").is_err());
    // Messages received before the close are still delivered
    assert_eq!(conn.recv().await, Some(Message::Text("bye".into())));
    assert_eq!(conn.recv().await, None);
    assert_eq!(conn.join().await, ConnFinishedReason::TheyDisconnected);
}

#[tokio::test]
async fn server_going_away_is_a_receive_error() {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    peer.close();
    let reason = conn.join().await;
    assert!(matches!(reason, ConnFinishedReason::ErrorReceiving(_)));
}

#[tokio::test]
async fn dropping_the_connection_closes_it() {
    init_logging();
    let server = quiet_server();
    let (conn, peer) = connect(&server).await;

    drop(conn);
    let next = tokio::time::timeout(Duration::from_secs(5), recv_non_ping(&peer))
        .await
        .expect("connection was not closed");
    assert!(next.is_none());
}

#[tokio::test]
async fn closed_server_refuses_dials() {
    init_logging();
    let server = quiet_server();
    server.close();
    let dialer = Dialer::build_tokio()
        .with_transport(server.transport("channel"))
        .build();

    let err = dialer.dial(URL).await.unwrap_err();
    assert!(matches!(err, DialError::TransportDialFailed { .. }));
}

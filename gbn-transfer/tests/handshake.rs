//! Integration tests for the 3-way handshake.
//!
//! Each test binds real `tokio::net::UdpSocket`s on loopback, runs the
//! Responder in a background task, and checks what both sides agree on once
//! the handshake completes.

use std::net::SocketAddr;
use std::time::Duration;

use gbn_transfer::{
    config::EngineConfig,
    error::TransferError,
    handshake::Endpoint,
    simulator::{FaultPlan, LossySocket},
    socket::Socket,
    state::{DataRole, HandshakeRole, HandshakeState},
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ephemeral() -> Socket {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind socket")
}

fn fast() -> EngineConfig {
    EngineConfig::default()
        .with_rto(Duration::from_millis(200))
        .with_max_control_retries(10)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Both sides should reach `ESTABLISHED` after a clean handshake on loopback.
#[tokio::test]
async fn handshake_both_sides_reach_established() {
    let server_socket = ephemeral().await;
    let server_addr = server_socket.local_addr;

    let server_task = tokio::spawn(async move {
        Endpoint::new(server_socket, DataRole::Source, fast()).accept().await
    });

    let client = tokio::time::timeout(
        Duration::from_secs(5),
        Endpoint::new(ephemeral().await, DataRole::Sink, fast()).connect(server_addr),
    )
    .await
    .expect("client connect timed out")
    .expect("client connect failed");

    let server = tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("server accept timed out")
        .expect("server task panicked")
        .expect("server accept failed");

    assert_eq!(client.handshake_state(), HandshakeState::Established);
    assert_eq!(server.handshake_state(), HandshakeState::Established);
    assert_eq!(client.handshake_role(), HandshakeRole::Initiator);
    assert_eq!(server.handshake_role(), HandshakeRole::Responder);
    assert_eq!(server.peer(), Some(client.socket().local_addr));
}

/// Each side's next send number is the other side's next expected number,
/// and both ISNs were spent on exactly one synchronising segment.
#[tokio::test]
async fn handshake_sequence_numbers_agree() {
    let server_socket = ephemeral().await;
    let server_addr = server_socket.local_addr;

    let server_task = tokio::spawn(async move {
        Endpoint::new(server_socket, DataRole::Source, fast()).accept().await
    });
    let client = Endpoint::new(ephemeral().await, DataRole::Sink, fast())
        .connect(server_addr)
        .await
        .unwrap();
    let server = server_task.await.unwrap().unwrap();

    assert_eq!(client.local_seq(), client.initial_seq().wrapping_add(1));
    assert_eq!(server.local_seq(), server.initial_seq().wrapping_add(1));
    assert_eq!(server.local_ack(), client.local_seq());
    assert_eq!(client.local_ack(), server.local_seq());
}

/// Pinned ISNs at the top of the space wrap to zero.
#[tokio::test]
async fn handshake_wraps_at_top_of_sequence_space() {
    let server_socket = ephemeral().await;
    let server_addr = server_socket.local_addr;

    let server_task = tokio::spawn(async move {
        Endpoint::new(
            server_socket,
            DataRole::Source,
            fast().with_initial_seq(Some(u32::MAX)),
        )
        .accept()
        .await
    });
    let client = Endpoint::new(
        ephemeral().await,
        DataRole::Sink,
        fast().with_initial_seq(Some(u32::MAX - 1)),
    )
    .connect(server_addr)
    .await
    .unwrap();
    let server = server_task.await.unwrap().unwrap();

    assert_eq!(server.local_seq(), 0);
    assert_eq!(client.local_ack(), 0);
    assert_eq!(client.local_seq(), u32::MAX);
    assert_eq!(server.local_ack(), u32::MAX);
}

/// The name the Responder announces in SYN+ACK reaches the Initiator.
#[tokio::test]
async fn announced_name_reaches_initiator() {
    let server_socket = ephemeral().await;
    let server_addr = server_socket.local_addr;

    let server_task = tokio::spawn(async move {
        Endpoint::new(server_socket, DataRole::Source, fast())
            .announce("OutputApple.jpg")
            .accept()
            .await
    });
    let client = Endpoint::new(ephemeral().await, DataRole::Sink, fast())
        .connect(server_addr)
        .await
        .unwrap();
    let server = server_task.await.unwrap().unwrap();

    assert_eq!(client.peer_announced_name(), Some("OutputApple.jpg"));
    assert_eq!(server.peer_announced_name(), None);
}

/// A lost SYN is resent after one timeout and the handshake still completes.
#[tokio::test]
async fn lost_syn_is_retransmitted() {
    let server_socket = ephemeral().await;
    let server_addr = server_socket.local_addr;

    let server_task = tokio::spawn(async move {
        Endpoint::new(server_socket, DataRole::Source, fast()).accept().await
    });

    let client_socket = LossySocket::bind(
        "127.0.0.1:0".parse().unwrap(),
        FaultPlan::none().drop_nth(0),
    )
    .await
    .unwrap();
    let client = Endpoint::new(client_socket, DataRole::Sink, fast())
        .connect(server_addr)
        .await
        .unwrap();
    let server = server_task.await.unwrap().unwrap();

    assert_eq!(client.stats().retransmissions, 1);
    assert_eq!(client.socket().stats().dropped, 1);
    assert_eq!(server.handshake_state(), HandshakeState::Established);
}

/// Nobody answers: the Initiator gives up after its control retries instead
/// of hanging.
#[tokio::test]
async fn connect_to_silent_peer_fails_after_retries() {
    // Bound but never read from, so SYNs vanish without an ICMP error.
    let silent = ephemeral().await;

    let config = EngineConfig::default()
        .with_rto(Duration::from_millis(50))
        .with_max_control_retries(2);
    let result = Endpoint::new(ephemeral().await, DataRole::Sink, config)
        .connect(silent.local_addr)
        .await;

    assert!(
        matches!(result, Err(TransferError::HandshakeFailed { attempts: 3 })),
        "expected HandshakeFailed, got: {:?}",
        result.map(|s| s.handshake_state())
    );
}

/// A Responder with an accept timeout stops listening.
#[tokio::test]
async fn accept_times_out_without_syn() {
    let config = fast().with_accept_timeout(Some(Duration::from_millis(100)));
    let result = Endpoint::new(ephemeral().await, DataRole::Source, config)
        .accept()
        .await;
    assert!(matches!(result, Err(TransferError::HandshakeFailed { .. })));
}

//! Integration tests for sealchat.
//!
//! These run the whole stack over loopback TCP: key generation, handshake,
//! secure channel and duplex session.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sealchat::chat::{
    spawn_session, ChatConfig, ChatError, CloseReason, DuplexSession, HandshakeCoordinator,
    HandshakeState, Received, Role, SecureChannel, SessionEvent, TcpChannel, TcpListener,
};
use sealchat::crypto::{Fingerprint, KeyPair};

const WAIT: Duration = Duration::from_secs(15);

fn test_config() -> ChatConfig {
    ChatConfig::default()
        .with_key_bits(1024)
        .with_connect_timeout(Duration::from_secs(5))
        .with_key_exchange_timeout(Duration::from_secs(5))
}

/// Host and joiner channels connected over loopback, plus each side's key pair.
async fn connected_channels() -> (TcpChannel, TcpChannel, KeyPair, KeyPair) {
    let host_keys = KeyPair::generate(1024).unwrap();
    let join_keys = KeyPair::generate(1024).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();

    let host_task = {
        let keys = host_keys.clone();
        tokio::spawn(async move {
            let mut coordinator = HandshakeCoordinator::new(Role::Listener, test_config());
            let established = coordinator.listen(&listener, &keys).await.unwrap();
            assert_eq!(coordinator.state(), HandshakeState::Established);
            SecureChannel::new(established, keys)
        })
    };

    let mut coordinator = HandshakeCoordinator::new(Role::Initiator, test_config());
    let established = coordinator.connect(addr, &join_keys).await.unwrap();
    let join = SecureChannel::new(established, join_keys.clone());
    let host = host_task.await.unwrap();

    (host, join, host_keys, join_keys)
}

struct Peer {
    input: mpsc::Sender<String>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    handle: JoinHandle<CloseReason>,
}

impl Peer {
    fn start(channel: TcpChannel) -> Self {
        let (input_tx, input_rx) = mpsc::channel(8);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = spawn_session(DuplexSession::new(channel), input_rx, events_tx);
        Self {
            input: input_tx,
            events: events_rx,
            handle,
        }
    }

    async fn type_line(&self, line: &str) {
        self.input.send(line.to_string()).await.unwrap();
    }

    async fn next_event(&mut self) -> SessionEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream ended")
    }

    async fn finish(self) -> CloseReason {
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("session did not stop")
            .unwrap()
    }
}

#[tokio::test]
async fn test_hello_world_exit() {
    let (host, join, _, _) = connected_channels().await;
    let mut host = Peer::start(host);
    let mut join = Peer::start(join);

    host.type_line("hello").await;
    assert_eq!(host.next_event().await, SessionEvent::Sent("hello".into()));
    assert_eq!(join.next_event().await, SessionEvent::Received("hello".into()));

    join.type_line("world").await;
    assert_eq!(join.next_event().await, SessionEvent::Sent("world".into()));
    assert_eq!(host.next_event().await, SessionEvent::Received("world".into()));

    host.type_line("exit").await;
    assert_eq!(
        host.next_event().await,
        SessionEvent::Closed(CloseReason::LocalExit)
    );
    assert_eq!(
        join.next_event().await,
        SessionEvent::Closed(CloseReason::PeerClosed)
    );

    assert_eq!(host.finish().await, CloseReason::LocalExit);
    assert_eq!(join.finish().await, CloseReason::PeerClosed);
}

#[tokio::test]
async fn test_fingerprints_match_actual_keys() {
    let (host, join, host_keys, join_keys) = connected_channels().await;

    // Each side's view of the partner matches the partner's own computation
    assert_eq!(
        *host.peer().fingerprint(),
        Fingerprint::of_public_key(join_keys.public_key()).unwrap()
    );
    assert_eq!(
        *join.peer().fingerprint(),
        Fingerprint::of_public_key(host_keys.public_key()).unwrap()
    );
    assert_ne!(host.peer().fingerprint(), join.peer().fingerprint());

    assert_eq!(host.peer().key(), join_keys.public_key());
    assert_eq!(join.peer().key(), host_keys.public_key());
}

#[tokio::test]
async fn test_both_directions_interleaved() {
    let (mut host, mut join, _, _) = connected_channels().await;

    for i in 0..3 {
        host.send(&format!("host {}", i)).await.unwrap();
        join.send(&format!("join {}", i)).await.unwrap();
    }

    for i in 0..3 {
        assert_eq!(
            join.receive().await.unwrap(),
            Received::Message(format!("host {}", i))
        );
        assert_eq!(
            host.receive().await.unwrap(),
            Received::Message(format!("join {}", i))
        );
    }
}

#[tokio::test]
async fn test_oversize_rejected_end_to_end() {
    let (mut host, mut join, _, _) = connected_channels().await;
    let max = host.max_message_len();

    let result = host.send(&"m".repeat(max + 1)).await;
    assert!(matches!(result, Err(ChatError::MessageTooLong { .. })));

    host.send(&"m".repeat(max)).await.unwrap();
    assert_eq!(
        join.receive().await.unwrap(),
        Received::Message("m".repeat(max))
    );
}

#[tokio::test]
async fn test_abrupt_disconnect_ends_partner_session() {
    let (host, join, _, _) = connected_channels().await;
    let mut host = Peer::start(host);

    // Joiner vanishes without typing exit
    drop(join);

    match host.next_event().await {
        SessionEvent::Closed(CloseReason::PeerClosed)
        | SessionEvent::Closed(CloseReason::ConnectionLost(_)) => {}
        other => panic!("unexpected event: {:?}", other),
    }
    let reason = host.finish().await;
    assert!(matches!(
        reason,
        CloseReason::PeerClosed | CloseReason::ConnectionLost(_)
    ));
}

#[tokio::test]
async fn test_join_without_host_fails() {
    let addr: SocketAddr = {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        listener.local_addr().unwrap()
    };

    let keys = KeyPair::generate(1024).unwrap();
    let mut coordinator = HandshakeCoordinator::new(Role::Initiator, test_config());
    let result = coordinator.connect(addr, &keys).await;

    assert!(matches!(result, Err(ChatError::HandshakeFailed(_))));
    assert_eq!(coordinator.state(), HandshakeState::Failed);
}

#[tokio::test]
async fn test_peer_that_never_sends_key_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();

    // A raw TCP client that connects and then stays silent
    let silent = tokio::spawn(async move {
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(stream);
    });

    let keys = KeyPair::generate(1024).unwrap();
    let config = test_config().with_key_exchange_timeout(Duration::from_millis(300));
    let mut coordinator = HandshakeCoordinator::new(Role::Listener, config);
    let result = coordinator.listen(&listener, &keys).await;

    assert!(matches!(result, Err(ChatError::HandshakeFailed(_))));
    assert_eq!(coordinator.state(), HandshakeState::Failed);
    silent.abort();
}

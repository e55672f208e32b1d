//! Handshake protocol for establishing a chat session.
//!
//! The handshake exchanges public keys over a fresh connection and binds the
//! peer's key to the session. It runs exactly once per coordinator.
//!
//! ## Flow
//!
//! Listener (host): bind, accept one connection, send own key, receive peer key.
//!
//! Initiator (join): connect, receive peer key, send own key.
//!
//! The opposite orderings mean neither side waits on the other's first frame.
//! Both sides then show the fingerprint of the key they received; nothing
//! rejects a mismatch automatically (trust on first use).
//!
//! ## States
//!
//! `Idle → Connecting → KeyExchanging → Established`, with any failure moving
//! to the terminal `Failed` state.

use std::net::SocketAddr;

use rsa::RsaPublicKey;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, warn};

use crate::chat::config::ChatConfig;
use crate::chat::error::ChatError;
use crate::chat::transport::{self, FramedTransport, TcpListener};
use crate::crypto::{decode_public_key_pem, max_plaintext_len, modulus_bits, Fingerprint, KeyPair};

/// Role in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Binds and waits for the peer (host).
    Listener,
    /// Connects to a waiting peer (join).
    Initiator,
}

/// Progress of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing attempted yet.
    Idle,
    /// Waiting for the TCP connection.
    Connecting,
    /// Connected, swapping public keys.
    KeyExchanging,
    /// Peer key bound; terminal success.
    Established,
    /// Terminal failure.
    Failed,
}

/// The remote endpoint's public key, received once per session.
#[derive(Debug, Clone)]
pub struct PeerPublicKey {
    key: RsaPublicKey,
    serialized: Vec<u8>,
    fingerprint: Fingerprint,
}

impl PeerPublicKey {
    /// Parse a key frame exactly as it arrived on the wire.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, ChatError> {
        let pem = std::str::from_utf8(bytes).map_err(|_| {
            ChatError::HandshakeFailed("peer key is not a PEM document".to_string())
        })?;
        let key = decode_public_key_pem(pem)
            .map_err(|e| ChatError::HandshakeFailed(format!("invalid peer key: {}", e)))?;

        Ok(Self {
            key,
            serialized: bytes.to_vec(),
            fingerprint: Fingerprint::from_serialized(bytes),
        })
    }

    /// The parsed key.
    pub fn key(&self) -> &RsaPublicKey {
        &self.key
    }

    /// The key bytes as received.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }

    /// Fingerprint of the received bytes.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        modulus_bits(&self.key)
    }

    /// Largest message, in bytes, that can be encrypted for this peer.
    pub fn max_message_len(&self) -> usize {
        max_plaintext_len(&self.key)
    }
}

/// Result of a successful handshake.
pub struct Established<R, W> {
    /// The connection, ready for encrypted frames.
    pub transport: FramedTransport<R, W>,
    /// The peer's bound public key.
    pub peer: PeerPublicKey,
    /// Which side we played.
    pub role: Role,
}

/// Established handshake over TCP.
pub type TcpEstablished = Established<OwnedReadHalf, OwnedWriteHalf>;

/// Drives one side of the key exchange.
#[derive(Debug)]
pub struct HandshakeCoordinator {
    role: Role,
    state: HandshakeState,
    config: ChatConfig,
}

impl HandshakeCoordinator {
    /// Create an idle coordinator.
    pub fn new(role: Role, config: ChatConfig) -> Self {
        Self {
            role,
            state: HandshakeState::Idle,
            config,
        }
    }

    /// Our role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Accept exactly one connection on `listener` and exchange keys over it.
    pub async fn listen(
        &mut self,
        listener: &TcpListener,
        keys: &KeyPair,
    ) -> Result<TcpEstablished, ChatError> {
        self.begin(Role::Listener)?;

        let accepted = match self.config.accept_timeout {
            Some(limit) => match tokio::time::timeout(limit, listener.accept()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(self.fail(ChatError::HandshakeFailed(format!(
                        "no peer connected within {}s",
                        limit.as_secs_f32()
                    ))))
                }
            },
            None => listener.accept().await,
        };

        let transport = accepted.map_err(|e| {
            self.fail(ChatError::HandshakeFailed(format!("Failed to accept: {}", e)))
        })?;

        if let Some(addr) = transport.peer_addr() {
            info!(peer = %addr, "peer connected");
        }
        self.exchange(transport, keys).await
    }

    /// Connect to `addr` and exchange keys.
    pub async fn connect(
        &mut self,
        addr: SocketAddr,
        keys: &KeyPair,
    ) -> Result<TcpEstablished, ChatError> {
        self.begin(Role::Initiator)?;

        let transport = transport::connect(addr, self.config.connect_timeout)
            .await
            .map_err(|e| {
                self.fail(ChatError::HandshakeFailed(format!(
                    "Failed to connect to {}: {}",
                    addr, e
                )))
            })?;

        info!(peer = %addr, "connected");
        self.exchange(transport, keys).await
    }

    /// Exchange keys over an already established connection.
    pub async fn exchange<R, W>(
        &mut self,
        mut transport: FramedTransport<R, W>,
        keys: &KeyPair,
    ) -> Result<Established<R, W>, ChatError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let state = self.state;
        if !matches!(state, HandshakeState::Idle | HandshakeState::Connecting) {
            return Err(self.reject_reuse(state));
        }
        self.state = HandshakeState::KeyExchanging;

        let own_pem = keys
            .public_key_pem()
            .map_err(|e| self.fail(ChatError::HandshakeFailed(e.to_string())))?;

        let limit = self.config.key_exchange_timeout;
        let swap = swap_keys(&mut transport, self.role, own_pem.as_bytes());
        let peer = match tokio::time::timeout(limit, swap).await {
            Ok(Ok(peer)) => peer,
            Ok(Err(e)) => return Err(self.fail(into_handshake_error(e))),
            Err(_) => {
                return Err(self.fail(ChatError::HandshakeFailed(format!(
                    "key exchange did not finish within {}s",
                    limit.as_secs_f32()
                ))))
            }
        };

        self.state = HandshakeState::Established;
        info!(
            role = ?self.role,
            bits = peer.bits(),
            fingerprint = %peer.fingerprint(),
            "handshake established"
        );

        Ok(Established {
            transport,
            peer,
            role: self.role,
        })
    }

    fn begin(&mut self, role: Role) -> Result<(), ChatError> {
        if self.state != HandshakeState::Idle {
            return Err(self.reject_reuse(self.state));
        }
        if self.role != role {
            return Err(self.fail(ChatError::HandshakeFailed(format!(
                "coordinator was created for the {:?} role",
                self.role
            ))));
        }
        self.state = HandshakeState::Connecting;
        Ok(())
    }

    fn reject_reuse(&mut self, previous: HandshakeState) -> ChatError {
        self.fail(ChatError::HandshakeFailed(format!(
            "handshake already attempted (state: {:?})",
            previous
        )))
    }

    fn fail(&mut self, err: ChatError) -> ChatError {
        warn!(role = ?self.role, error = %err, "handshake failed");
        self.state = HandshakeState::Failed;
        err
    }
}

/// Send and receive public keys in the order dictated by `role`.
async fn swap_keys<R, W>(
    transport: &mut FramedTransport<R, W>,
    role: Role,
    own_key: &[u8],
) -> Result<PeerPublicKey, ChatError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    match role {
        Role::Listener => {
            transport.write_frame(own_key).await?;
            debug!(bytes = own_key.len(), "sent public key");
            receive_key(transport).await
        }
        Role::Initiator => {
            let peer = receive_key(transport).await?;
            transport.write_frame(own_key).await?;
            debug!(bytes = own_key.len(), "sent public key");
            Ok(peer)
        }
    }
}

async fn receive_key<R, W>(
    transport: &mut FramedTransport<R, W>,
) -> Result<PeerPublicKey, ChatError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    match transport.read_frame().await? {
        Some(bytes) => {
            debug!(bytes = bytes.len(), "received public key");
            PeerPublicKey::from_wire(&bytes)
        }
        None => Err(ChatError::HandshakeFailed(
            "peer closed the connection before sending its public key".to_string(),
        )),
    }
}

fn into_handshake_error(err: ChatError) -> ChatError {
    match err {
        ChatError::HandshakeFailed(_) => err,
        other => ChatError::HandshakeFailed(format!("key exchange failed: {}", other)),
    }
}

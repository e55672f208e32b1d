//! Encrypted message channel.
//!
//! A `SecureChannel` is the encryption boundary: plaintext goes in, one
//! RSA-OAEP ciphertext frame goes out, and vice versa. It can only be built
//! from an established handshake, so the peer key is always bound before the
//! first message.

use std::net::SocketAddr;

use rsa::RsaPrivateKey;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use crate::chat::error::ChatError;
use crate::chat::protocol::{Established, PeerPublicKey};
use crate::chat::transport::{FrameReader, FrameWriter};
use crate::crypto::{decrypt_text, encrypt_text, KeyPair};

/// Outcome of a receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A decrypted message.
    Message(String),
    /// The peer closed the connection in an orderly way.
    PeerClosed,
}

/// Sending half: encrypts under the peer's public key.
pub struct SecureSender<W> {
    writer: FrameWriter<W>,
    peer: PeerPublicKey,
}

impl<W: AsyncWrite + Unpin + Send> SecureSender<W> {
    /// Encrypt `plaintext` for the peer and write it as one frame.
    ///
    /// Messages longer than [`max_message_len`](Self::max_message_len) bytes
    /// are rejected with [`ChatError::MessageTooLong`], never truncated.
    pub async fn send(&mut self, plaintext: &str) -> Result<(), ChatError> {
        let ciphertext = encrypt_text(plaintext, self.peer.key())?;
        self.writer.write_frame(&ciphertext).await?;
        trace!(bytes = ciphertext.len(), "sent encrypted frame");
        Ok(())
    }

    /// Close the connection's write direction. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        self.writer.close().await
    }

    /// Whether the connection was closed from this side.
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// The bound peer key.
    pub fn peer(&self) -> &PeerPublicKey {
        &self.peer
    }

    /// Payload capacity per message, in UTF-8 bytes.
    pub fn max_message_len(&self) -> usize {
        self.peer.max_message_len()
    }
}

/// Receiving half: decrypts with the local private key.
pub struct SecureReceiver<R> {
    reader: FrameReader<R>,
    private_key: RsaPrivateKey,
}

impl<R: AsyncRead + Unpin + Send> SecureReceiver<R> {
    /// Wait for the next frame and decrypt it.
    ///
    /// A frame that fails to decrypt yields [`ChatError::DecryptionFailed`];
    /// the frame is consumed and the receiver can be called again.
    pub async fn receive(&mut self) -> Result<Received, ChatError> {
        let frame = match self.reader.read_frame().await? {
            Some(frame) => frame,
            None => {
                debug!("peer closed the connection");
                return Ok(Received::PeerClosed);
            }
        };

        trace!(bytes = frame.len(), "received encrypted frame");
        let plaintext = decrypt_text(&frame, &self.private_key)?;
        Ok(Received::Message(plaintext))
    }
}

/// An encrypted, bidirectional channel to one peer.
pub struct SecureChannel<R, W> {
    sender: SecureSender<W>,
    receiver: SecureReceiver<R>,
    peer_addr: Option<SocketAddr>,
}

impl<R, W> SecureChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Bind the connection, our key pair, and the peer key.
    pub fn new(established: Established<R, W>, keys: KeyPair) -> Self {
        let peer_addr = established.transport.peer_addr();
        let (reader, writer) = established.transport.split();

        Self {
            sender: SecureSender {
                writer,
                peer: established.peer,
            },
            receiver: SecureReceiver {
                reader,
                private_key: keys.into_private_key(),
            },
            peer_addr,
        }
    }

    /// See [`SecureSender::send`].
    pub async fn send(&mut self, plaintext: &str) -> Result<(), ChatError> {
        self.sender.send(plaintext).await
    }

    /// See [`SecureReceiver::receive`].
    pub async fn receive(&mut self) -> Result<Received, ChatError> {
        self.receiver.receive().await
    }

    /// Close the write direction.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        self.sender.close().await
    }

    /// The bound peer key.
    pub fn peer(&self) -> &PeerPublicKey {
        self.sender.peer()
    }

    /// Remote address, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Payload capacity per message.
    pub fn max_message_len(&self) -> usize {
        self.sender.max_message_len()
    }

    /// Separate the halves so inbound and outbound can run concurrently.
    pub fn split(self) -> (SecureSender<W>, SecureReceiver<R>) {
        (self.sender, self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::protocol::Role;
    use crate::chat::transport::FramedTransport;
    use crate::crypto::encrypt;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type DuplexChannel = SecureChannel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;
    type RawTransport = FramedTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn bind(transport: RawTransport, keys: KeyPair, peer: &KeyPair, role: Role) -> DuplexChannel {
        let pem = peer.public_key_pem().unwrap();
        let established = Established {
            transport,
            peer: PeerPublicKey::from_wire(pem.as_bytes()).unwrap(),
            role,
        };
        SecureChannel::new(established, keys)
    }

    fn channel_pair() -> (DuplexChannel, DuplexChannel) {
        let (a, b) = tokio::io::duplex(8192);
        let host_keys = KeyPair::generate(1024).unwrap();
        let join_keys = KeyPair::generate(1024).unwrap();

        let host = bind(
            FramedTransport::from_stream(a),
            host_keys.clone(),
            &join_keys,
            Role::Listener,
        );
        let join = bind(
            FramedTransport::from_stream(b),
            join_keys,
            &host_keys,
            Role::Initiator,
        );
        (host, join)
    }

    #[tokio::test]
    async fn test_send_receive_both_directions() {
        let (mut host, mut join) = channel_pair();

        host.send("hello").await.unwrap();
        assert_eq!(join.receive().await.unwrap(), Received::Message("hello".into()));

        join.send("world").await.unwrap();
        assert_eq!(host.receive().await.unwrap(), Received::Message("world".into()));
    }

    #[tokio::test]
    async fn test_messages_keep_order() {
        let (mut host, mut join) = channel_pair();

        for i in 0..5 {
            host.send(&format!("Message {}", i)).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(
                join.receive().await.unwrap(),
                Received::Message(format!("Message {}", i))
            );
        }
    }

    #[tokio::test]
    async fn test_message_too_long() {
        let (mut host, _join) = channel_pair();
        let max = host.max_message_len();
        assert_eq!(max, 62);

        let result = host.send(&"A".repeat(max + 1)).await;
        assert!(matches!(
            result,
            Err(ChatError::MessageTooLong { len, max: m }) if len == max + 1 && m == max
        ));

        // Length is counted in encoded bytes, not characters
        let result = host.send(&"é".repeat(max / 2 + 1)).await;
        assert!(matches!(result, Err(ChatError::MessageTooLong { .. })));

        // The channel is still usable after a rejected message
        host.send(&"A".repeat(max)).await.unwrap();
    }

    #[tokio::test]
    async fn test_tampered_frame_is_rejected_then_recovers() {
        let (a, b) = tokio::io::duplex(8192);
        let keys = KeyPair::generate(1024).unwrap();
        let other = KeyPair::generate(1024).unwrap();

        let mut raw = FramedTransport::from_stream(a);
        let transport = FramedTransport::from_stream(b);
        let mut channel = bind(transport, keys.clone(), &other, Role::Listener);

        let mut ciphertext = encrypt(b"pay 10 coins", keys.public_key()).unwrap();
        ciphertext[17] ^= 0x04;
        raw.write_frame(&ciphertext).await.unwrap();

        let result = channel.receive().await;
        assert!(matches!(result, Err(ChatError::DecryptionFailed(_))));

        // The next intact frame still decrypts
        let ciphertext = encrypt(b"pay 10 coins", keys.public_key()).unwrap();
        raw.write_frame(&ciphertext).await.unwrap();
        assert_eq!(
            channel.receive().await.unwrap(),
            Received::Message("pay 10 coins".into())
        );
    }

    #[tokio::test]
    async fn test_frame_for_other_key_is_rejected() {
        let (a, b) = tokio::io::duplex(8192);
        let keys = KeyPair::generate(1024).unwrap();
        let other = KeyPair::generate(1024).unwrap();

        let mut raw = FramedTransport::from_stream(a);
        let mut channel = bind(FramedTransport::from_stream(b), keys, &other, Role::Listener);

        let ciphertext = encrypt(b"not for you", other.public_key()).unwrap();
        raw.write_frame(&ciphertext).await.unwrap();

        assert!(matches!(channel.receive().await, Err(ChatError::DecryptionFailed(_))));
    }

    #[tokio::test]
    async fn test_peer_closed_sentinel() {
        let (mut host, mut join) = channel_pair();

        host.send("bye").await.unwrap();
        host.close().await.unwrap();

        assert_eq!(join.receive().await.unwrap(), Received::Message("bye".into()));
        assert_eq!(join.receive().await.unwrap(), Received::PeerClosed);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (mut host, _join) = channel_pair();

        host.close().await.unwrap();
        host.close().await.unwrap();

        let result = host.send("too late").await;
        assert!(matches!(result, Err(ChatError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_split_halves_work_concurrently() {
        let (host, join) = channel_pair();
        let (mut host_tx, mut host_rx) = host.split();
        let (mut join_tx, mut join_rx) = join.split();

        let outbound = tokio::spawn(async move {
            host_tx.send("ping").await.unwrap();
            host_tx
        });
        let inbound = tokio::spawn(async move {
            let msg = join_rx.receive().await.unwrap();
            join_tx.send("pong").await.unwrap();
            msg
        });

        assert_eq!(inbound.await.unwrap(), Received::Message("ping".into()));
        assert_eq!(host_rx.receive().await.unwrap(), Received::Message("pong".into()));
        assert!(!outbound.await.unwrap().is_closed());
    }
}

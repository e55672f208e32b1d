//! # Sealchat Chat Module
//!
//! Direct, two-party chat where every message is encrypted with the peer's
//! RSA public key.
//!
//! A session moves through three stages:
//!
//! 1. [`HandshakeCoordinator`] connects (or accepts) and swaps public keys
//! 2. [`SecureChannel`] binds the connection to both keys
//! 3. [`DuplexSession`] sends and receives concurrently until either side leaves
//!
//! ## Security Model
//!
//! - **Fresh keys** for every run, kept in memory only
//! - **RSA-OAEP (SHA-256)** per message, no symmetric layer
//! - **Fingerprints** are shown to both users for out-of-band comparison
//! - **No authentication** beyond that comparison (trust on first use)

mod channel;
mod config;
mod error;
pub mod protocol;
mod session;
pub mod transport;

pub use channel::{Received, SecureChannel, SecureReceiver, SecureSender};
pub use config::{
    is_exit_command, ChatConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_KEY_EXCHANGE_TIMEOUT_SECS,
    DEFAULT_PORT, EXIT_COMMAND,
};
pub use error::ChatError;
pub use protocol::{
    Established, HandshakeCoordinator, HandshakeState, PeerPublicKey, Role, TcpEstablished,
};
pub use session::{spawn_session, CloseReason, DecryptPolicy, DuplexSession, SessionEvent};
pub use transport::{FramedTransport, TcpConnection, TcpListener, MAX_FRAME_LEN};

/// Secure channel over a TCP connection.
pub type TcpChannel = SecureChannel<
    tokio::net::tcp::OwnedReadHalf,
    tokio::net::tcp::OwnedWriteHalf,
>;

// The largest ciphertext must fit in one frame.
const _: () = assert!(crate::crypto::MAX_KEY_BITS / 8 <= MAX_FRAME_LEN);

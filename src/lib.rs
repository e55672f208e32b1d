//! # Sealchat - encrypted peer-to-peer text chat
//!
//! Sealchat connects two people directly over TCP. Each side generates a
//! fresh RSA key pair, the public keys are swapped as the first frame in
//! each direction, and every later message is encrypted with RSA-OAEP under
//! the recipient's key.
//!
//! ## Overview
//!
//! - One side **hosts** (binds and waits), the other **joins** (connects)
//! - Public keys are exchanged in opposite orders so neither side deadlocks
//! - Both users see the **fingerprint** of the key they received and compare
//!   it out of band
//! - Sending and receiving run **concurrently**; either user can type `exit`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sealchat::chat::{ChatConfig, HandshakeCoordinator, Role, SecureChannel, TcpListener};
//! use sealchat::crypto::KeyPair;
//!
//! # async fn host() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChatConfig::default();
//! let keys = KeyPair::generate(config.key_bits)?;
//!
//! let listener = TcpListener::bind("127.0.0.1:9999".parse()?)?;
//! let mut coordinator = HandshakeCoordinator::new(Role::Listener, config);
//! let established = coordinator.listen(&listener, &keys).await?;
//! println!("Partner fingerprint: {}", established.peer.fingerprint());
//!
//! let mut channel = SecureChannel::new(established, keys);
//! channel.send("hello").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: Key generation, RSA-OAEP encryption, fingerprints
//! - [`chat`]: Framing, handshake, secure channel and duplex session

pub mod chat;
pub mod crypto;

// Re-export commonly used types at the crate root
pub use chat::{ChatConfig, ChatError, DuplexSession, HandshakeCoordinator, SecureChannel};
pub use crypto::{Fingerprint, KeyPair};

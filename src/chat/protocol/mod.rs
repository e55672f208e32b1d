//! Chat protocol types and operations.
//!
//! The protocol has two phases:
//!
//! - **Handshake**: each side sends its PKCS#1 PEM public key in one frame
//! - **Exchange**: every later frame is one RSA-OAEP ciphertext

mod handshake;

pub use handshake::{
    Established, HandshakeCoordinator, HandshakeState, PeerPublicKey, Role, TcpEstablished,
};

//! Cryptographic operations for sealchat.
//!
//! This module provides:
//! - RSA key pair generation and PKCS#1 PEM public key encoding
//! - Per-message RSA-OAEP (SHA-256) encryption
//! - SHA-256 key fingerprints for manual verification

pub mod asymmetric;
pub mod fingerprint;
pub mod keys;

pub use asymmetric::{
    decrypt, decrypt_text, encrypt, encrypt_text, max_plaintext_len, AsymmetricError,
};
pub use fingerprint::Fingerprint;
pub use keys::{
    decode_public_key_pem, encode_public_key_pem, modulus_bits, KeyError, KeyPair,
    DEFAULT_KEY_BITS, MAX_KEY_BITS, MIN_KEY_BITS,
};

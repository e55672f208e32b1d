//! Key generation and serialization for sealchat.
//!
//! This module handles RSA key pair generation and PKCS#1 PEM serialization
//! of public keys. Private keys are never serialized: they live in memory for
//! the duration of one session and are dropped with it.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest accepted modulus size in bits.
pub const MIN_KEY_BITS: usize = 1024;

/// Largest accepted modulus size in bits.
///
/// Ciphertexts are as long as the modulus, so this also bounds the size of
/// every encrypted frame (512 bytes).
pub const MAX_KEY_BITS: usize = 4096;

/// Errors that can occur during key operations.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Unsupported key size: {bits} bits (expected {min}..={max})")]
    InvalidBitLength { bits: usize, min: usize, max: usize },

    #[error("Key generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid PEM format: {0}")]
    InvalidPem(String),
}

/// An RSA key pair containing both public and private keys.
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose private key in debug output for security
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generates a fresh key pair with the given modulus size.
    ///
    /// Every call draws new randomness from the OS, so keys are never reused
    /// across sessions.
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        check_bit_length(bits)?;

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| KeyError::GenerationFailed(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        Ok(Self { private, public })
    }

    /// Generates a key pair with [`DEFAULT_KEY_BITS`].
    pub fn generate_default() -> Result<Self, KeyError> {
        Self::generate(DEFAULT_KEY_BITS)
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Returns the private key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Consumes the key pair and returns the private key.
    pub fn into_private_key(self) -> RsaPrivateKey {
        self.private
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        modulus_bits(&self.public)
    }

    /// Encodes our public key for the wire.
    pub fn public_key_pem(&self) -> Result<String, KeyError> {
        encode_public_key_pem(&self.public)
    }
}

/// Returns the modulus size of a public key in bits.
pub fn modulus_bits(key: &RsaPublicKey) -> usize {
    key.n().bits()
}

/// Encodes a public key as PKCS#1 PEM (`-----BEGIN RSA PUBLIC KEY-----`).
pub fn encode_public_key_pem(key: &RsaPublicKey) -> Result<String, KeyError> {
    key.to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KeyError::InvalidPem(e.to_string()))
}

/// Decodes a PKCS#1 PEM public key and checks that its size is supported.
pub fn decode_public_key_pem(pem: &str) -> Result<RsaPublicKey, KeyError> {
    let key = RsaPublicKey::from_pkcs1_pem(pem.trim())
        .map_err(|e| KeyError::InvalidPem(e.to_string()))?;
    check_bit_length(modulus_bits(&key))?;
    Ok(key)
}

fn check_bit_length(bits: usize) -> Result<(), KeyError> {
    if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
        return Err(KeyError::InvalidBitLength {
            bits,
            min: MIN_KEY_BITS,
            max: MAX_KEY_BITS,
        });
    }
    Ok(())
}

//! Asymmetric encryption using RSA-OAEP with SHA-256.
//!
//! Each message is encrypted directly under the recipient's public key, so a
//! single call can carry at most [`max_plaintext_len`] bytes. Nothing is
//! chunked: longer inputs are rejected.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

/// SHA-256 output size, used by the OAEP overhead calculation.
const HASH_LEN: usize = 32;

/// Errors that can occur during asymmetric encryption operations.
#[derive(Error, Debug)]
pub enum AsymmetricError {
    #[error("Message too long: {len} bytes (max {max} for this key)")]
    MessageTooLong { len: usize, max: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Decrypted message is not valid UTF-8")]
    InvalidUtf8,
}

/// Largest plaintext, in bytes, that fits one OAEP block under `key`.
///
/// `k - 2 * hLen - 2`, which is 190 bytes for a 2048-bit key.
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(2 * HASH_LEN + 2)
}

/// Encrypts `plaintext` for the holder of the private half of `public_key`.
///
/// The output is exactly as long as the key modulus.
pub fn encrypt(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, AsymmetricError> {
    let max = max_plaintext_len(public_key);
    if plaintext.len() > max {
        return Err(AsymmetricError::MessageTooLong {
            len: plaintext.len(),
            max,
        });
    }

    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()))
}

/// Decrypts a ciphertext produced by [`encrypt`].
///
/// Any modification of the ciphertext makes the OAEP padding check fail.
pub fn decrypt(ciphertext: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, AsymmetricError> {
    if ciphertext.len() != private_key.size() {
        return Err(AsymmetricError::DecryptionFailed(format!(
            "ciphertext is {} bytes, expected {}",
            ciphertext.len(),
            private_key.size()
        )));
    }

    private_key
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|e| AsymmetricError::DecryptionFailed(e.to_string()))
}

/// Encrypts a text message.
pub fn encrypt_text(text: &str, public_key: &RsaPublicKey) -> Result<Vec<u8>, AsymmetricError> {
    encrypt(text.as_bytes(), public_key)
}

/// Decrypts a text message, rejecting plaintext that is not UTF-8.
pub fn decrypt_text(
    ciphertext: &[u8],
    private_key: &RsaPrivateKey,
) -> Result<String, AsymmetricError> {
    let bytes = decrypt(ciphertext, private_key)?;
    String::from_utf8(bytes).map_err(|_| AsymmetricError::InvalidUtf8)
}

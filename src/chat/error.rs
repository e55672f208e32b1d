//! Chat error types.

use thiserror::Error;

use crate::crypto::{AsymmetricError, KeyError};

/// Errors that can occur during chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Local key pair could not be generated.
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(#[source] KeyError),

    /// Handshake failed with the given reason.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The connection broke (reset, broken pipe, truncated frame).
    #[error("Connection error: {0}")]
    ConnectionError(#[from] std::io::Error),

    /// A frame exceeded the transport's buffer capacity.
    #[error("Frame too large: {len} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared or attempted frame length.
        len: usize,
        /// Maximum allowed frame length.
        max: usize,
    },

    /// Plaintext does not fit a single encrypted frame.
    #[error("Message too long: {len} bytes (max: {max} for the peer's key)")]
    MessageTooLong {
        /// Encoded length of the rejected message.
        len: usize,
        /// Payload capacity of the peer's key.
        max: usize,
    },

    /// Encryption failed for a reason other than length.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// A received frame did not decrypt under our private key.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

impl ChatError {
    /// True when the connection can no longer be used.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::FrameTooLarge { .. })
    }

    /// True when the error only affects one message and the channel stays usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MessageTooLong { .. } | Self::EncryptionFailed(_) | Self::DecryptionFailed(_)
        )
    }
}

impl From<AsymmetricError> for ChatError {
    fn from(err: AsymmetricError) -> Self {
        match err {
            AsymmetricError::MessageTooLong { len, max } => Self::MessageTooLong { len, max },
            AsymmetricError::EncryptionFailed(msg) => Self::EncryptionFailed(msg),
            AsymmetricError::DecryptionFailed(msg) => Self::DecryptionFailed(msg),
            AsymmetricError::InvalidUtf8 => Self::DecryptionFailed(err.to_string()),
        }
    }
}

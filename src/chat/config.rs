//! Chat configuration.

use std::time::Duration;

use crate::chat::error::ChatError;
use crate::crypto::{KeyPair, DEFAULT_KEY_BITS};

/// Default TCP port for hosting and joining.
pub const DEFAULT_PORT: u16 = 9999;

/// Default time allowed for an outgoing TCP connect.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default time allowed for the public key exchange once connected.
pub const DEFAULT_KEY_EXCHANGE_TIMEOUT_SECS: u64 = 30;

/// Input line that ends the session.
pub const EXIT_COMMAND: &str = "exit";

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// TCP port to bind (host) or connect to (join).
    pub port: u16,

    /// RSA modulus size for the local key pair.
    pub key_bits: usize,

    /// Limit for establishing an outgoing connection.
    pub connect_timeout: Duration,

    /// Limit for the key exchange after the connection exists.
    pub key_exchange_timeout: Duration,

    /// Limit for waiting on an inbound connection; `None` waits forever.
    pub accept_timeout: Option<Duration>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            key_bits: DEFAULT_KEY_BITS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            key_exchange_timeout: Duration::from_secs(DEFAULT_KEY_EXCHANGE_TIMEOUT_SECS),
            accept_timeout: None,
        }
    }
}

impl ChatConfig {
    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the local key size.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the key exchange timeout.
    pub fn with_key_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.key_exchange_timeout = timeout;
        self
    }

    /// Set (or clear) the accept timeout.
    pub fn with_accept_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.accept_timeout = timeout;
        self
    }

    /// Generate the local key pair for one session.
    ///
    /// This is CPU-bound; async callers should run it on a blocking thread.
    pub fn generate_key_pair(&self) -> Result<KeyPair, ChatError> {
        KeyPair::generate(self.key_bits).map_err(ChatError::KeyGenerationFailed)
    }
}

/// True if `line` is the exit command.
pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.port, 9999);
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.connect_timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));
        assert_eq!(
            config.key_exchange_timeout,
            Duration::from_secs(DEFAULT_KEY_EXCHANGE_TIMEOUT_SECS)
        );
        assert_eq!(config.accept_timeout, None);
    }

    #[test]
    fn test_builders() {
        let config = ChatConfig::default()
            .with_port(4000)
            .with_key_bits(1024)
            .with_connect_timeout(Duration::from_secs(1))
            .with_key_exchange_timeout(Duration::from_secs(2))
            .with_accept_timeout(Some(Duration::from_secs(3)));

        assert_eq!(config.port, 4000);
        assert_eq!(config.key_bits, 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.key_exchange_timeout, Duration::from_secs(2));
        assert_eq!(config.accept_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_exit_command() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("  EXIT \n"));
        assert!(is_exit_command("Exit"));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("quit"));
    }

    #[test]
    fn test_generate_key_pair() {
        let keys = ChatConfig::default().with_key_bits(1024).generate_key_pair().unwrap();
        assert_eq!(keys.bits(), 1024);

        let result = ChatConfig::default().with_key_bits(512).generate_key_pair();
        assert!(matches!(result, Err(ChatError::KeyGenerationFailed(_))));
    }
}

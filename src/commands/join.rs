//! Join command - connect to a waiting host.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use sealchat::chat::{ChatConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PORT};
use sealchat::crypto::DEFAULT_KEY_BITS;

use super::chat;
use super::host::decrypt_policy;
use super::CommandExecutor;

/// Connect to a partner who is hosting.
#[derive(Args, Debug)]
pub struct JoinCommand {
    /// Host address (IP or hostname)
    #[arg(required = true)]
    pub host: String,

    /// Port the host listens on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// RSA key size in bits (1024-4096)
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    pub key_bits: usize,

    /// Seconds to wait for the TCP connection
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// End the chat on the first message that fails to decrypt
    #[arg(long)]
    pub strict: bool,
}

impl CommandExecutor for JoinCommand {
    fn execute(&self) -> Result<()> {
        let addr = resolve(&self.host, self.port)?;
        let config = ChatConfig::default()
            .with_port(self.port)
            .with_key_bits(self.key_bits)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout));

        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(chat::join(addr, config, decrypt_policy(self.strict)))
    }
}

/// Resolve `host:port` to the first matching socket address.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Could not resolve host '{}'", host))?
        .next()
        .with_context(|| format!("No address found for '{}'", host))
}

//! Host command - wait for a partner to connect.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use sealchat::chat::transport::detect_local_ip;
use sealchat::chat::{ChatConfig, DecryptPolicy, DEFAULT_PORT};
use sealchat::crypto::DEFAULT_KEY_BITS;

use super::chat;
use super::CommandExecutor;

/// Host a chat and wait for one partner.
///
/// Binds to the address of the outbound network interface unless `--bind`
/// is given. Share the printed address with your partner.
#[derive(Args, Debug)]
pub struct HostCommand {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Local IP address to bind (default: detected automatically)
    #[arg(short, long)]
    pub bind: Option<IpAddr>,

    /// RSA key size in bits (1024-4096)
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    pub key_bits: usize,

    /// Give up if nobody connects within this many seconds (default: wait forever)
    #[arg(long)]
    pub accept_timeout: Option<u64>,

    /// End the chat on the first message that fails to decrypt
    #[arg(long)]
    pub strict: bool,
}

impl CommandExecutor for HostCommand {
    fn execute(&self) -> Result<()> {
        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

        rt.block_on(async {
            let ip = match self.bind {
                Some(ip) => ip,
                None => detect_local_ip()
                    .await
                    .context("Could not detect the local IP address; pass --bind")?,
            };

            chat::host(ip, self.config(), decrypt_policy(self.strict)).await
        })
    }
}

impl HostCommand {
    fn config(&self) -> ChatConfig {
        ChatConfig::default()
            .with_port(self.port)
            .with_key_bits(self.key_bits)
            .with_accept_timeout(self.accept_timeout.map(Duration::from_secs))
    }
}

/// Map the `--strict` flag to a decryption policy.
pub fn decrypt_policy(strict: bool) -> DecryptPolicy {
    if strict {
        DecryptPolicy::Abort
    } else {
        DecryptPolicy::Report
    }
}

//! Sealchat - encrypted peer-to-peer chat
//!
//! A CLI for direct, RSA-encrypted text chat between two machines.
//! Run without a subcommand for the interactive menu.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CommandExecutor, HostCommand, JoinCommand, MenuCommand};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "SEALCHAT_LOG";

/// Sealchat - encrypted peer-to-peer chat
///
/// Each run generates a fresh RSA key pair. Public keys are swapped when the
/// connection opens and every message is encrypted for the partner's key.
/// Compare the printed fingerprints with your partner before trusting the chat.
#[derive(Parser)]
#[command(name = "sealchat")]
#[command(version)]
#[command(about = "Encrypted peer-to-peer text chat with per-session RSA keys")]
#[command(long_about = None)]
struct Cli {
    /// Show debug logs on stderr (SEALCHAT_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a chat and wait for a partner
    Host(HostCommand),

    /// Connect to a partner who is hosting
    Join(JoinCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Host(cmd)) => cmd.execute(),
        Some(Commands::Join(cmd)) => cmd.execute(),
        None => MenuCommand.execute(),
    }
}

/// Send logs to stderr so the transcript on stdout stays readable.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

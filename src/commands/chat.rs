//! Conversation loop shared by the host, join and menu commands.
//!
//! The flow is the same for both roles: generate keys, run the handshake,
//! show fingerprints, then hand stdin and stdout to a duplex session.

use std::io::{self, BufRead};
use std::net::{IpAddr, SocketAddr};
use std::thread;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::debug;

use sealchat::chat::{
    spawn_session, ChatConfig, CloseReason, DecryptPolicy, DuplexSession, HandshakeCoordinator,
    Role, SecureChannel, SessionEvent, TcpEstablished, TcpListener, EXIT_COMMAND,
};
use sealchat::crypto::{Fingerprint, KeyPair};

use super::fingerprint::print_fingerprint;

/// Lines typed ahead of the sender before stdin blocks.
const INPUT_QUEUE: usize = 32;

/// Host a chat: bind, wait for one partner, then converse.
pub async fn host(ip: IpAddr, config: ChatConfig, policy: DecryptPolicy) -> Result<()> {
    let keys = generate_keys(&config).await?;

    let addr = SocketAddr::new(ip, config.port);
    let listener =
        TcpListener::bind(addr).with_context(|| format!("Failed to listen on {}", addr))?;
    let local = listener.local_addr()?;

    println!("Hosting on {}:{}", local.ip(), local.port());
    println!("Share this address with your partner. Waiting for a connection...");

    let mut coordinator = HandshakeCoordinator::new(Role::Listener, config);
    let established = coordinator
        .listen(&listener, &keys)
        .await
        .context("Could not establish the chat")?;
    // Only one partner per session
    drop(listener);

    converse(established, keys, policy).await
}

/// Join a hosted chat.
pub async fn join(addr: SocketAddr, config: ChatConfig, policy: DecryptPolicy) -> Result<()> {
    let keys = generate_keys(&config).await?;

    println!("Connecting to {}...", addr);
    let mut coordinator = HandshakeCoordinator::new(Role::Initiator, config);
    let established = coordinator
        .connect(addr, &keys)
        .await
        .context("Could not establish the chat")?;

    converse(established, keys, policy).await
}

/// Generate the session key pair off the async workers.
async fn generate_keys(config: &ChatConfig) -> Result<KeyPair> {
    println!("Generating {}-bit RSA key pair...", config.key_bits);
    let config = config.clone();
    let keys = tokio::task::spawn_blocking(move || config.generate_key_pair())
        .await
        .context("Key generation task failed")??;
    Ok(keys)
}

/// Show fingerprints and run the session until either side leaves.
async fn converse(
    established: TcpEstablished,
    keys: KeyPair,
    policy: DecryptPolicy,
) -> Result<()> {
    if let Some(addr) = established.transport.peer_addr() {
        println!("Connected to {}", addr);
    }
    println!();

    let own = Fingerprint::of_public_key(keys.public_key())?;
    println!("Your key fingerprint: {}", own);
    println!();
    print_fingerprint("Partner key", established.peer.fingerprint());
    println!();
    println!("Compare the partner fingerprint with your partner over another channel.");

    let channel = SecureChannel::new(established, keys);
    println!(
        "Messages up to {} bytes. Type '{}' to leave.",
        channel.max_message_len(),
        EXIT_COMMAND
    );
    println!();

    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE);
    spawn_stdin_reader(input_tx)?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session = DuplexSession::new(channel).with_decrypt_policy(policy);
    let handle = spawn_session(session, input_rx, events_tx);

    while let Some(event) = events_rx.recv().await {
        if let Some(line) = render_event(&event) {
            match event {
                SessionEvent::Received(_) | SessionEvent::Closed(_) => println!("{}", line),
                _ => eprintln!("{}", line),
            }
        }
    }

    match handle.await.context("Chat session task failed")? {
        CloseReason::ConnectionLost(e) => bail!("Connection lost: {}", e),
        CloseReason::DecryptAborted(e) => bail!("Stopped on an undecryptable message: {}", e),
        reason => {
            debug!(%reason, "chat finished");
            Ok(())
        }
    }
}

/// Transcript line for a session event, if it should be shown.
///
/// Sent messages are not repeated; the terminal already echoed them.
fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Sent(_) => None,
        SessionEvent::Received(text) => Some(format!("Partner: {}", text)),
        SessionEvent::DecryptFailed(e) => Some(format!("! Could not decrypt a message: {}", e)),
        SessionEvent::SendFailed(e) => Some(format!("! Not sent: {}", e)),
        SessionEvent::Closed(reason) => Some(format!("* Chat closed: {}.", reason)),
    }
}

/// Feed stdin lines into the session from a dedicated thread.
///
/// Blocking stdin reads stay off the runtime; the thread ends with stdin or
/// when the session stops listening.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) -> Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        })
        .context("Failed to start input reader")?;
    Ok(())
}

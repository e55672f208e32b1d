//! Full-duplex chat session.
//!
//! A `DuplexSession` drives one [`SecureChannel`] with two tasks: the inbound
//! task waits for frames from the peer, the outbound task waits for local
//! input lines. Neither blocks the other. Whichever task finishes first flips
//! a shared shutdown signal, the other stops at its next await point, and the
//! write direction of the connection is shut down exactly once.
//!
//! The session never prints. Everything the user should see is reported as a
//! [`SessionEvent`] on an unbounded channel.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chat::channel::{Received, SecureChannel, SecureReceiver, SecureSender};
use crate::chat::config::is_exit_command;
use crate::chat::error::ChatError;

/// Longest wait for the write direction to shut down cleanly.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that happened during the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A local message was encrypted and sent.
    Sent(String),
    /// A message from the peer was decrypted.
    Received(String),
    /// A frame from the peer could not be decrypted.
    DecryptFailed(String),
    /// A local message was rejected (too long, cipher failure). Not sent.
    SendFailed(String),
    /// The session is over. Always the last event.
    Closed(CloseReason),
}

/// Why a session (or one of its loops) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The local user typed the exit command.
    LocalExit,
    /// The peer closed the connection.
    PeerClosed,
    /// Local input ended (end of stdin).
    InputEnded,
    /// The connection failed.
    ConnectionLost(String),
    /// Decryption failed and the session was configured to stop on it.
    DecryptAborted(String),
    /// Stopped because the other loop finished first.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::LocalExit => write!(f, "session ended"),
            CloseReason::PeerClosed => write!(f, "partner disconnected"),
            CloseReason::InputEnded => write!(f, "input closed"),
            CloseReason::ConnectionLost(e) => write!(f, "connection lost: {}", e),
            CloseReason::DecryptAborted(e) => {
                write!(f, "stopped after undecryptable message: {}", e)
            }
            CloseReason::Shutdown => write!(f, "shut down"),
        }
    }
}

/// How the inbound loop reacts to a frame that fails to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecryptPolicy {
    /// Report the failure and keep receiving.
    #[default]
    Report,
    /// Report the failure and end the session.
    Abort,
}

/// Runs inbound and outbound message flow concurrently over one channel.
pub struct DuplexSession<R, W> {
    channel: SecureChannel<R, W>,
    decrypt_policy: DecryptPolicy,
}

impl<R, W> DuplexSession<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a session over an established channel.
    pub fn new(channel: SecureChannel<R, W>) -> Self {
        Self {
            channel,
            decrypt_policy: DecryptPolicy::default(),
        }
    }

    /// Set the decryption failure policy.
    pub fn with_decrypt_policy(mut self, policy: DecryptPolicy) -> Self {
        self.decrypt_policy = policy;
        self
    }

    /// Run until either side ends the session.
    ///
    /// Lines arriving on `input` are sent to the peer; the line `exit` ends
    /// the session. Returns the reason of the loop that finished first, after
    /// both loops have stopped. A [`SessionEvent::Closed`] with the same
    /// reason is the last event emitted.
    pub async fn run(
        self,
        input: mpsc::Receiver<String>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> CloseReason {
        let peer = self.channel.peer_addr();
        let (sender, receiver) = self.channel.split();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(?peer, "chat session started");

        let mut inbound = tokio::spawn(inbound_loop(
            receiver,
            events.clone(),
            shutdown_rx.clone(),
            self.decrypt_policy,
        ));
        let mut outbound =
            tokio::spawn(outbound_loop(sender, input, events.clone(), shutdown_rx));

        let (first, remaining) = tokio::select! {
            result = &mut inbound => (result, outbound),
            result = &mut outbound => (result, inbound),
        };

        // Stop the other loop; a send error only means it already exited
        let _ = shutdown_tx.send(true);
        let first = task_reason(first);
        let second = task_reason(remaining.await);
        debug!(%first, %second, "both session loops stopped");
        let reason = settle(first, second);

        info!(%reason, "chat session closed");
        let _ = events.send(SessionEvent::Closed(reason.clone()));
        reason
    }
}

/// Pick the reason to report once both loops stopped.
fn settle(first: CloseReason, second: CloseReason) -> CloseReason {
    match (&first, &second) {
        // The peer's close was its answer to ours
        (CloseReason::PeerClosed, CloseReason::LocalExit | CloseReason::InputEnded) => second,
        _ => first,
    }
}

fn task_reason(result: Result<CloseReason, tokio::task::JoinError>) -> CloseReason {
    result.unwrap_or_else(|e| CloseReason::ConnectionLost(format!("session task failed: {}", e)))
}

/// Receive frames until the peer leaves, the connection fails, or shutdown.
async fn inbound_loop<R: AsyncRead + Unpin + Send>(
    mut receiver: SecureReceiver<R>,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
    policy: DecryptPolicy,
) -> CloseReason {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return CloseReason::Shutdown,
            received = receiver.receive() => match received {
                Ok(Received::Message(text)) => {
                    let _ = events.send(SessionEvent::Received(text));
                }
                Ok(Received::PeerClosed) => return CloseReason::PeerClosed,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "dropping undecryptable frame");
                    let _ = events.send(SessionEvent::DecryptFailed(e.to_string()));
                    if policy == DecryptPolicy::Abort {
                        return CloseReason::DecryptAborted(e.to_string());
                    }
                }
                Err(e) => return connection_lost("receive", e),
            },
        }
    }
}

/// Send input lines until exit, end of input, a connection failure, or
/// shutdown. Always closes the write direction before returning.
async fn outbound_loop<W: AsyncWrite + Unpin + Send>(
    mut sender: SecureSender<W>,
    mut input: mpsc::Receiver<String>,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> CloseReason {
    let reason = loop {
        tokio::select! {
            _ = shutdown.changed() => break CloseReason::Shutdown,
            line = input.recv() => {
                let Some(line) = line else {
                    break CloseReason::InputEnded;
                };
                if is_exit_command(&line) {
                    break CloseReason::LocalExit;
                }

                let text = line.trim_end_matches(['\r', '\n']);
                if text.trim().is_empty() {
                    continue;
                }

                // A peer that stops reading must not keep us from shutting down
                let sent = tokio::select! {
                    _ = shutdown.changed() => break CloseReason::Shutdown,
                    sent = sender.send(text) => sent,
                };

                match sent {
                    Ok(()) => {
                        let _ = events.send(SessionEvent::Sent(text.to_string()));
                    }
                    Err(e) if e.is_recoverable() => {
                        let _ = events.send(SessionEvent::SendFailed(e.to_string()));
                    }
                    Err(e) => break connection_lost("send", e),
                }
            }
        }
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, sender.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "closing connection"),
        Err(_) => debug!("peer is not draining; dropping the connection unflushed"),
    }
    reason
}

/// Reason for a loop that hit a non-recoverable error.
fn connection_lost(direction: &str, err: ChatError) -> CloseReason {
    if err.is_disconnect() {
        warn!(error = %err, "{} failed, connection lost", direction);
    } else {
        warn!(error = %err, "unexpected {} error, ending session", direction);
    }
    CloseReason::ConnectionLost(err.to_string())
}

/// Spawn a session in the background.
///
/// Convenience for callers that drive input and events themselves.
pub fn spawn_session<R, W>(
    session: DuplexSession<R, W>,
    input: mpsc::Receiver<String>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<CloseReason>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(session.run(input, events))
}

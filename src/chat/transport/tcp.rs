//! TCP transport for chat connections.
//!
//! This provides a TCP-based transport using tokio for async I/O. The stream
//! is split into owned halves so the inbound and outbound tasks can read and
//! write concurrently without sharing a lock.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener as TokioTcpListener, TcpSocket, TcpStream, UdpSocket};
use tracing::debug;

use crate::chat::error::ChatError;
use crate::chat::transport::FramedTransport;

/// Well-known external address used to discover the outbound interface.
///
/// Connecting a UDP socket sends no packets; it only makes the OS pick a route.
pub const PROBE_ADDR: &str = "8.8.8.8:80";

/// Framed TCP connection.
pub type TcpConnection = FramedTransport<OwnedReadHalf, OwnedWriteHalf>;

impl FramedTransport<OwnedReadHalf, OwnedWriteHalf> {
    /// Wrap an established TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Result<Self, ChatError> {
        let peer_addr = stream.peer_addr()?;
        // Chat frames are small and latency matters more than batching
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self::new(read_half, write_half).with_peer_addr(peer_addr))
    }
}

/// Connect to a remote address, giving up after `timeout`.
pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<TcpConnection, ChatError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {}s", timeout.as_secs_f32()),
            )
        })??;

    debug!(peer = %addr, "TCP connection established");
    TcpConnection::from_tcp(stream)
}

/// TCP listener that accepts a single chat peer.
pub struct TcpListener {
    listener: TokioTcpListener,
}

impl TcpListener {
    /// Bind to an address and start listening with a backlog of one.
    pub fn bind(addr: SocketAddr) -> Result<Self, ChatError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(1)?;

        Ok(Self { listener })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<TcpConnection, ChatError> {
        let (stream, addr) = self.listener.accept().await?;
        debug!(peer = %addr, "accepted TCP connection");
        TcpConnection::from_tcp(stream)
    }

    /// Get the local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Find the address of the interface used for outbound traffic.
///
/// Returns an error when there is no route (offline machine); callers fall
/// back to asking the operator.
pub async fn detect_local_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(PROBE_ADDR).await?;
    let ip = socket.local_addr()?.ip();

    if ip.is_unspecified() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no outbound interface",
        ));
    }
    Ok(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_tcp_connection() {
        let listener = TcpListener::bind(loopback()).unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move {
            let mut conn = connect(addr, Duration::from_secs(5)).await.unwrap();
            assert_eq!(conn.peer_addr(), Some(addr));

            conn.write_frame(b"test").await.unwrap();
            let response = conn.read_frame().await.unwrap();
            assert_eq!(response, Some(b"response".to_vec()));

            conn.close().await.unwrap();
        });

        let mut server_conn = listener.accept().await.unwrap();
        assert!(server_conn.peer_addr().is_some());

        let msg = server_conn.read_frame().await.unwrap();
        assert_eq!(msg, Some(b"test".to_vec()));

        server_conn.write_frame(b"response").await.unwrap();

        // Client closed its side after reading
        assert_eq!(server_conn.read_frame().await.unwrap(), None);

        client_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_messages() {
        let listener = TcpListener::bind(loopback()).unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move {
            let mut conn = connect(addr, Duration::from_secs(5)).await.unwrap();
            for i in 0..10 {
                conn.write_frame(format!("msg{}", i).as_bytes()).await.unwrap();
            }
            conn.close().await.unwrap();
        });

        let mut server_conn = listener.accept().await.unwrap();
        for i in 0..10 {
            let msg = server_conn.read_frame().await.unwrap();
            assert_eq!(msg, Some(format!("msg{}", i).into_bytes()));
        }
        assert_eq!(server_conn.read_frame().await.unwrap(), None);

        client_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind and immediately drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind(loopback()).unwrap();
            listener.local_addr().unwrap()
        };

        let result = connect(addr, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ChatError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_rebind_same_port() {
        let addr = {
            let listener = TcpListener::bind(loopback()).unwrap();
            listener.local_addr().unwrap()
        };

        // SO_REUSEADDR lets a new session reuse the port right away
        let listener = TcpListener::bind(addr).unwrap();
        assert_eq!(listener.local_addr().unwrap(), addr);
    }
}

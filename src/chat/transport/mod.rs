//! Transport layer for chat connections.
//!
//! Every protocol unit (one serialized public key, or one ciphertext) travels
//! as one frame: a 4-byte little-endian length followed by the payload. Frames
//! are bounded by [`MAX_FRAME_LEN`], which is the capacity of the fixed-size
//! read and write buffers. The transport knows nothing about encryption.

mod tcp;

pub use tcp::{connect, detect_local_ip, TcpConnection, TcpListener, PROBE_ADDR};

use std::io;
use std::net::SocketAddr;

use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};

use crate::chat::error::ChatError;

/// Largest payload a single frame may carry.
pub const MAX_FRAME_LEN: usize = 4096;

/// Size of the length prefix.
const LEN_PREFIX: usize = 4;

/// Buffer capacity: one full frame plus its prefix.
const BUFFER_CAPACITY: usize = MAX_FRAME_LEN + LEN_PREFIX;

/// Write one frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ChatError> {
    if data.len() > MAX_FRAME_LEN {
        return Err(ChatError::FrameTooLarge {
            len: data.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames. A connection that ends in the middle of a frame is an error.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, ChatError> {
    let mut len_bytes = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        let n = reader.read(&mut len_bytes[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside a frame header",
            )
            .into());
        }
        filled += n;
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ChatError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(Some(data))
}

/// Read side of a framed connection.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// Wrap a reader with a fixed-size buffer.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_CAPACITY, reader),
        }
    }

    /// Read the next frame; `None` means the peer closed the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ChatError> {
        read_frame(&mut self.reader).await
    }
}

/// Write side of a framed connection.
pub struct FrameWriter<W> {
    writer: BufWriter<W>,
    closed: bool,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// Wrap a writer with a fixed-size buffer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUFFER_CAPACITY, writer),
            closed: false,
        }
    }

    /// Write one frame.
    pub async fn write_frame(&mut self, data: &[u8]) -> Result<(), ChatError> {
        if self.closed {
            let err = io::Error::new(io::ErrorKind::BrokenPipe, "connection already closed");
            return Err(err.into());
        }
        write_frame(&mut self.writer, data).await
    }

    /// Shut down the write direction. Later calls do nothing.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A bidirectional framed connection.
pub struct FramedTransport<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    peer_addr: Option<SocketAddr>,
}

impl<S: AsyncRead + AsyncWrite + Send> FramedTransport<ReadHalf<S>, WriteHalf<S>> {
    /// Frame any duplex stream.
    pub fn from_stream(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::new(read_half, write_half)
    }
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Frame a pair of independent read and write halves.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            peer_addr: None,
        }
    }

    /// Record the remote address for display.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Remote address, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Write one frame.
    pub async fn write_frame(&mut self, data: &[u8]) -> Result<(), ChatError> {
        self.writer.write_frame(data).await
    }

    /// Read one frame; `None` means the peer closed the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ChatError> {
        self.reader.read_frame().await
    }

    /// Shut down the write direction.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        self.writer.close().await
    }

    /// Separate the halves so they can be driven from different tasks.
    pub fn split(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }
}

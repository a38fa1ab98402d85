//! Length-prefixed Protobuf framing.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Protobuf binary          │
//! └──────────────────┴──────────────────────────┘
//! ```

use std::io::{ErrorKind, Read};
use std::time::Duration;

use prost::Message;

use crate::error::{Result, RoadmapError};

/// Largest frame accepted from a peer (stereo pairs included).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encode a message with its length prefix.
pub fn encode_frame<M: Message>(msg: &M) -> Vec<u8> {
    let len = msg.encoded_len();
    let mut buf = Vec::with_capacity(4 + len);
    buf.extend_from_slice(&(len as u32).to_be_bytes());
    // Vec<u8> grows on demand, encoding cannot run out of capacity
    msg.encode(&mut buf).ok();
    buf
}

/// Source of framed messages with a read timeout.
pub trait TimedRead: Read {
    fn read_timeout(&self) -> std::io::Result<Option<Duration>>;
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl TimedRead for std::net::TcpStream {
    fn read_timeout(&self) -> std::io::Result<Option<Duration>> {
        std::net::TcpStream::read_timeout(self)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::net::TcpStream::set_read_timeout(self, timeout)
    }
}

/// Reads length-prefixed messages from a stream.
///
/// Prefix bytes that arrive before a timeout are kept for the next call.
pub struct FrameReader<R> {
    inner: R,
    prefix: [u8; 4],
    prefix_len: usize,
    buffer: Vec<u8>,
    max_len: usize,
}

impl<R: TimedRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            prefix: [0u8; 4],
            prefix_len: 0,
            buffer: vec![0u8; 64 * 1024],
            max_len: MAX_FRAME_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Receive the next message, or `None` if no complete length prefix
    /// arrived within `timeout`.
    ///
    /// Only the length read is allowed to time out, and a partly read prefix
    /// is resumed on the next call. Once the prefix is complete the payload
    /// is read with a longer timeout so the stream stays aligned.
    pub fn recv_timeout<M: Message + Default>(&mut self, timeout: Duration) -> Result<Option<M>> {
        let old_timeout = self.inner.read_timeout()?;
        self.inner.set_read_timeout(Some(timeout))?;

        if let Err(e) = self.fill_prefix() {
            self.inner.set_read_timeout(old_timeout)?;
            return match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => Ok(None),
                _ => Err(e.into()),
            };
        }
        self.prefix_len = 0;

        let len = u32::from_be_bytes(self.prefix) as usize;
        if len > self.max_len {
            self.inner.set_read_timeout(old_timeout)?;
            return Err(RoadmapError::Decode(format!(
                "frame of {} bytes exceeds limit of {}",
                len, self.max_len
            )));
        }
        if len > self.buffer.len() {
            self.buffer.resize(len, 0);
        }

        self.inner.set_read_timeout(Some(Duration::from_secs(5)))?;
        let result = self.inner.read_exact(&mut self.buffer[..len]);
        self.inner.set_read_timeout(old_timeout)?;
        result?;

        Ok(Some(M::decode(&self.buffer[..len])?))
    }

    fn fill_prefix(&mut self) -> std::io::Result<()> {
        while self.prefix_len < self.prefix.len() {
            match self.inner.read(&mut self.prefix[self.prefix_len..]) {
                Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
                Ok(n) => self.prefix_len += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

//! Length prefixed frames exchanged with the voucher oracle.
//!
//! Every frame starts with a one byte message type, variable fields are a
//! big endian `u32` length followed by the bytes.

use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::FrameError;

pub mod message;

pub use message::{Request, Response};

/// Upper bound for a single field, vouchers are tiny
pub const MAX_FIELD: usize = 1 << 16;

/// returns one u8 if there is enough space or returns FrameError::Incomplete
pub fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    if !src.has_remaining() {
        return Err(FrameError::Incomplete);
    }
    Ok(src.get_u8())
}

/// returns one u32 if there is enough space or returns FrameError::Incomplete
pub fn get_u32(src: &mut Cursor<&[u8]>) -> Result<u32, FrameError> {
    if src.remaining() < 4 {
        return Err(FrameError::Incomplete);
    }
    Ok(src.get_u32())
}

/// returns one length prefixed byteslice if it is fully buffered
pub fn get_bytes<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], FrameError> {
    let len = get_u32(src)? as usize;
    if len > MAX_FIELD {
        return Err(FrameError::Oversized(len));
    }
    if src.remaining() < len {
        return Err(FrameError::Incomplete);
    }

    let start = src.position() as usize;
    src.advance(len);
    Ok(&src.get_ref()[start..start + len])
}

/// length prefixed utf8 field
pub fn get_string(src: &mut Cursor<&[u8]>) -> Result<String, FrameError> {
    let bytes = get_bytes(src)?;
    std::str::from_utf8(bytes)
        .map(Into::into)
        .map_err(|_| FrameError::Utf8)
}

pub fn put_bytes(dst: &mut BytesMut, bytes: &[u8]) {
    dst.put_u32(bytes.len() as u32);
    dst.put_slice(bytes);
}

pub trait Parse: Sized {
    /// Validates that one complete frame is buffered, advancing past it
    fn check(src: &mut Cursor<&[u8]>) -> Result<(), FrameError>;
    fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, FrameError>;
    fn encode(&self, dst: &mut BytesMut);
}

pub struct Connection<S: AsyncWrite + AsyncRead + Unpin> {
    stream: BufWriter<S>,
    buffer: BytesMut,
}

impl<S: AsyncWrite + AsyncRead + Unpin> Connection<S> {
    /// Initialises a new Connection with a given stream
    pub fn new(stream: S) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Tries to parse a frame out of the buffered bytes
    fn parse_frame<M: Parse>(&mut self) -> Result<Option<M>, FrameError> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match M::check(&mut buf) {
            Ok(_) => {
                let len = buf.position() as usize;
                buf.set_position(0);
                let msg = M::parse(&mut buf)?;
                self.buffer.advance(len);
                Ok(Some(msg))
            }
            Err(FrameError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads one frame, `None` on a clean shutdown by the peer
    pub async fn read_frame<M: Parse>(&mut self) -> Result<Option<M>, FrameError> {
        loop {
            if let Some(msg) = self.parse_frame()? {
                return Ok(Some(msg));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(FrameError::ConnectionReset)
                };
            }
        }
    }

    pub async fn write_frame<M: Parse>(&mut self, msg: &M) -> Result<(), FrameError> {
        let mut frame = BytesMut::new();
        msg.encode(&mut frame);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

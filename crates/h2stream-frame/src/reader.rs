use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{
    decode_frame, Decoded, Frame, FrameConfig, FrameHeader, FrameSource, FRAME_HEADER_LEN,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads DATA frames from any `Read` stream.
///
/// Handles partial reads internally and skips frames of other types, so
/// callers only ever see complete channel payloads.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next DATA frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` on end-of-stream between
    /// frames and `Err(FrameError::Truncated)` on end-of-stream inside one.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match decode_frame(&mut self.buf, self.config.max_read_frame_size)? {
                Some(Decoded::Data(frame)) => return Ok(frame),
                Some(Decoded::Skipped(header)) => {
                    trace!(
                        frame_type = header.frame_type,
                        stream_id = header.stream_id,
                        size = header.length,
                        "skipping non-data frame"
                    );
                    continue;
                }
                None => {}
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(self.eof_error());
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn eof_error(&self) -> FrameError {
        if self.buf.is_empty() {
            return FrameError::ConnectionClosed;
        }
        let expected = FrameHeader::parse(&self.buf)
            .map(|header| FRAME_HEADER_LEN + header.length as usize)
            .unwrap_or(FRAME_HEADER_LEN);
        FrameError::Truncated {
            expected,
            received: self.buf.len(),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read + Send> FrameSource for FrameReader<T> {
    fn read_frame(&mut self) -> Result<Frame> {
        FrameReader::read_frame(self)
    }
}

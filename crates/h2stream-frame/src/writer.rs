use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_data_frame, Frame, FrameConfig, FrameSink, MAX_FRAME_LEN};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes DATA frames to any `Write` stream.
///
/// Frames are written whole but never flushed implicitly; call
/// [`FrameWriter::flush`] to push them out.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    ///
    /// `max_write_frame_size` is clamped to `1..=2^24-1`.
    pub fn with_config(inner: T, mut config: FrameConfig) -> Self {
        config.max_write_frame_size = config.max_write_frame_size.clamp(1, MAX_FRAME_LEN);
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.channel, frame.payload.as_ref())
    }

    /// Encode and write `payload` as one DATA frame on `channel`.
    pub fn send(&mut self, channel: u32, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_write_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: payload.len(),
                max: self.config.max_write_frame_size,
            });
        }

        self.buf.clear();
        encode_data_frame(channel, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Write + Send> FrameSink for FrameWriter<T> {
    fn write_frame(&mut self, channel: u32, payload: &[u8]) -> Result<()> {
        self.send(channel, payload)
    }

    fn flush(&mut self) -> Result<()> {
        FrameWriter::flush(self)
    }

    fn max_frame_size(&self) -> usize {
        self.config.max_write_frame_size
    }
}

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::channel::MAX_CHANNEL_ID;
use crate::error::{FrameError, Result};

/// HTTP/2 frame header: length (3) + type (1) + flags (1) + stream id (4).
pub const FRAME_HEADER_LEN: usize = 9;

/// Largest length the 24-bit header field can express.
pub const MAX_FRAME_LEN: usize = (1 << 24) - 1;

/// Default payload size per written frame: 16 KiB, the HTTP/2 default
/// `SETTINGS_MAX_FRAME_SIZE`.
pub const DEFAULT_MAX_WRITE_FRAME: usize = 16 * 1024;

pub(crate) const FRAME_DATA: u8 = 0x0;
pub(crate) const FLAG_PADDED: u8 = 0x8;

const STREAM_ID_MASK: u32 = 0x7fff_ffff;

/// A payload routed to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel id (HTTP/2 stream id) this payload belongs to.
    pub channel: u32,
    /// The channel bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len()
    }
}

/// Decoded 9-byte HTTP/2 frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    /// Stream id with the reserved bit cleared.
    pub stream_id: u32,
}

impl FrameHeader {
    /// Parse a header from the start of `src`. Returns `None` if fewer than
    /// [`FRAME_HEADER_LEN`] bytes are available.
    pub fn parse(src: &[u8]) -> Option<Self> {
        if src.len() < FRAME_HEADER_LEN {
            return None;
        }
        let mut src = &src[..FRAME_HEADER_LEN];
        let length = src.get_uint(3) as u32;
        let frame_type = src.get_u8();
        let flags = src.get_u8();
        let stream_id = src.get_u32() & STREAM_ID_MASK;
        Some(Self {
            length,
            frame_type,
            flags,
            stream_id,
        })
    }

    /// Append the encoded header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_uint(u64::from(self.length), 3);
        dst.put_u8(self.frame_type);
        dst.put_u8(self.flags);
        dst.put_u32(self.stream_id & STREAM_ID_MASK);
    }

    /// Whether this is a DATA frame.
    pub fn is_data(&self) -> bool {
        self.frame_type == FRAME_DATA
    }
}

/// Result of decoding one complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A DATA frame carrying channel bytes.
    Data(Frame),
    /// Any other frame type; its payload has been consumed and dropped.
    Skipped(FrameHeader),
}

/// Encode one DATA frame carrying `payload` for `channel`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬──────────┬───┬──────────────────┬──────────┐
/// │ Length (24)  │ Type (8) │ Flags(8) │ R │ Stream id (31)   │ Payload  │
/// │ payload len  │ 0x0 DATA │ 0x0      │ 0 │ channel id       │          │
/// └──────────────┴──────────┴──────────┴───┴──────────────────┴──────────┘
/// ```
pub fn encode_data_frame(channel: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if channel == 0 || channel > MAX_CHANNEL_ID {
        return Err(FrameError::InvalidChannelId(channel));
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    dst.reserve(FRAME_HEADER_LEN + payload.len());
    FrameHeader {
        length: payload.len() as u32,
        frame_type: FRAME_DATA,
        flags: 0,
        stream_id: channel,
    }
    .encode(dst);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Decoded>> {
    let Some(header) = FrameHeader::parse(src) else {
        return Ok(None);
    };

    let length = header.length as usize;
    if length > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: length,
            max: max_frame_size,
        });
    }
    if src.len() < FRAME_HEADER_LEN + length {
        return Ok(None);
    }

    src.advance(FRAME_HEADER_LEN);
    let mut payload = src.split_to(length).freeze();

    if !header.is_data() {
        return Ok(Some(Decoded::Skipped(header)));
    }
    if header.stream_id == 0 {
        return Err(FrameError::Protocol("DATA frame on stream 0".to_string()));
    }
    if header.flags & FLAG_PADDED != 0 {
        payload = strip_padding(payload)?;
    }

    Ok(Some(Decoded::Data(Frame {
        channel: header.stream_id,
        payload,
    })))
}

fn strip_padding(mut payload: Bytes) -> Result<Bytes> {
    if payload.is_empty() {
        return Err(FrameError::Protocol(
            "padded DATA frame without pad length".to_string(),
        ));
    }
    let pad = payload[0] as usize;
    if pad >= payload.len() {
        return Err(FrameError::Protocol(format!(
            "pad length {pad} exceeds frame payload of {} bytes",
            payload.len()
        )));
    }
    payload.advance(1);
    payload.truncate(payload.len() - pad);
    Ok(payload)
}

/// Decode side of a channel codec.
pub trait FrameSource: Send {
    /// Read the next frame that carries channel bytes, discarding any
    /// other frame in between. Transport errors are returned unchanged.
    fn read_frame(&mut self) -> Result<Frame>;
}

/// Encode side of a channel codec.
pub trait FrameSink: Send {
    /// Write one frame carrying `payload` for `channel`. Nothing is flushed.
    fn write_frame(&mut self, channel: u32, payload: &[u8]) -> Result<()>;

    /// Flush the underlying connection.
    fn flush(&mut self) -> Result<()>;

    /// Largest payload this sink puts in a single frame.
    fn max_frame_size(&self) -> usize;
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Largest accepted incoming frame length. Default: 2^24 - 1.
    pub max_read_frame_size: usize,
    /// Largest payload per outgoing frame. Default: 16 KiB.
    pub max_write_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_read_frame_size: MAX_FRAME_LEN,
            max_write_frame_size: DEFAULT_MAX_WRITE_FRAME,
        }
    }
}

//! Frame codec for h2stream channel multiplexing.
//!
//! Every channel write travels as one or more HTTP/2 DATA frames:
//! - a 9-byte header (24-bit length, type, flags, 31-bit stream id)
//! - the stream id carries the channel id
//! - the payload carries the channel bytes, unmodified
//!
//! Non-DATA frames are skipped on read. Ordering and integrity come from the
//! underlying connection; no extra length prefix or checksum is added.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod version;
pub mod writer;

pub use channel::{channel_id, fnv1_32, ChannelIds, Fnv1Ids, MAX_CHANNEL_ID};
pub use codec::{
    decode_frame, encode_data_frame, Decoded, Frame, FrameConfig, FrameHeader, FrameSink,
    FrameSource, DEFAULT_MAX_WRITE_FRAME, FRAME_HEADER_LEN, MAX_FRAME_LEN,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use version::{
    is_stream_request, Codec, ProtocolVersion, PROTOCOL_HEADER, PROTOCOL_NAME,
    V5_PROTOCOL_VERSION, VERSION_HEADER,
};
pub use writer::FrameWriter;

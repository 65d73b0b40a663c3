//! Protocol version registry.
//!
//! The upgrade handshake happens outside this crate; what arrives here is
//! the negotiated version string. Each supported version maps to one codec
//! binding, and anything else is an error rather than a fallback.

use std::fmt;
use std::str::FromStr;

use h2stream_transport::{CloseHandle, Duplex};

use crate::codec::{FrameConfig, FrameSink, FrameSource};
use crate::error::{FrameError, Result};
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// Header naming the upgraded protocol.
pub const PROTOCOL_HEADER: &str = "protocol";

/// Value of [`PROTOCOL_HEADER`] for this protocol.
pub const PROTOCOL_NAME: &str = "h2stream";

/// Header carrying the negotiated protocol version.
pub const VERSION_HEADER: &str = "X-Stream-Protocol-Version";

pub const V5_PROTOCOL_VERSION: &str = "v5.channel.k8s.io";

/// Whether a request asks for an h2stream session.
///
/// Only HTTP/2 requests qualify; the protocol header match is
/// case-insensitive.
pub fn is_stream_request(http_version: &str, protocol_header: Option<&str>) -> bool {
    http_version == "HTTP/2.0"
        && protocol_header.is_some_and(|value| value.eq_ignore_ascii_case(PROTOCOL_NAME))
}

/// Supported protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Raw HTTP/2 DATA frames, stream id = channel id.
    V5,
}

impl ProtocolVersion {
    /// All supported versions, most preferred first.
    pub const ALL: &'static [ProtocolVersion] = &[ProtocolVersion::V5];

    /// Wire name of this version.
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V5 => V5_PROTOCOL_VERSION,
        }
    }

    pub fn latest() -> Self {
        ProtocolVersion::V5
    }

    /// Pick the first supported version from a peer's offer.
    pub fn negotiate<'a, I>(offered: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        offered
            .into_iter()
            .find_map(|candidate| candidate.trim().parse().ok())
    }

    /// Bind this version's codec to a duplex connection.
    pub fn bind(self, duplex: Duplex, config: &FrameConfig) -> Codec {
        match self {
            ProtocolVersion::V5 => {
                let (reader, writer, closer) = duplex.split();
                Codec {
                    version: self,
                    source: Box::new(FrameReader::with_config(reader, config.clone())),
                    sink: Box::new(FrameWriter::with_config(writer, config.clone())),
                    closer,
                }
            }
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = FrameError;

    fn from_str(value: &str) -> Result<Self> {
        ProtocolVersion::ALL
            .iter()
            .copied()
            .find(|version| version.as_str() == value)
            .ok_or_else(|| FrameError::UnsupportedVersion(value.to_string()))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A codec bound to one connection: independent read and write halves plus
/// the handle that closes the connection.
pub struct Codec {
    pub version: ProtocolVersion,
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
    pub closer: CloseHandle,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("version", &self.version)
            .field("max_write_frame_size", &self.sink.max_frame_size())
            .field("closed", &self.closer.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use h2stream_transport::memory_pair;

    use super::*;

    #[test]
    fn parses_known_version() {
        let version: ProtocolVersion = "v5.channel.k8s.io".parse().unwrap();
        assert_eq!(version, ProtocolVersion::V5);
        assert_eq!(version.to_string(), V5_PROTOCOL_VERSION);
        assert_eq!(ProtocolVersion::latest(), ProtocolVersion::V5);
    }

    #[test]
    fn unknown_version_is_typed_error() {
        let err = "v4.channel.k8s.io".parse::<ProtocolVersion>().unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedVersion(v) if v == "v4.channel.k8s.io"));
    }

    #[test]
    fn negotiate_picks_first_supported() {
        let offer = ["v6.channel.k8s.io", " v5.channel.k8s.io ", "v4.channel.k8s.io"];
        assert_eq!(ProtocolVersion::negotiate(offer), Some(ProtocolVersion::V5));
        assert_eq!(ProtocolVersion::negotiate(["channel.k8s.io"]), None);
    }

    #[test]
    fn stream_request_detection() {
        assert!(is_stream_request("HTTP/2.0", Some("h2stream")));
        assert!(is_stream_request("HTTP/2.0", Some("H2Stream")));
        assert!(!is_stream_request("HTTP/1.1", Some("h2stream")));
        assert!(!is_stream_request("HTTP/2.0", Some("websocket")));
        assert!(!is_stream_request("HTTP/2.0", None));
    }

    #[test]
    fn bound_codec_carries_frames() {
        let (left, right) = memory_pair();
        let config = FrameConfig::default();
        let mut client = ProtocolVersion::V5.bind(left, &config);
        let mut server = ProtocolVersion::V5.bind(right, &config);

        client.sink.write_frame(3, b"hello").unwrap();
        client.sink.flush().unwrap();

        let frame = server.source.read_frame().unwrap();
        assert_eq!(frame.channel, 3);
        assert_eq!(frame.payload.as_ref(), b"hello");

        client.closer.close().unwrap();
        let err = server.source.read_frame().unwrap_err();
        assert!(err.is_termination());
    }
}

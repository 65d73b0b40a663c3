use std::io;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection reached end-of-stream at a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection reached end-of-stream in the middle of a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },

    /// The frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The channel id cannot be carried as an HTTP/2 stream id.
    #[error("invalid channel id {0} (must be 1..=0x7fffffff)")]
    InvalidChannelId(u32),

    /// The peer sent a frame that violates the framing rules.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The negotiated protocol version has no codec.
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),
}

impl FrameError {
    /// Whether this error means the connection ended rather than failed.
    ///
    /// End-of-stream at a frame boundary and closed-pipe class I/O errors
    /// count as termination; everything else, including end-of-stream in
    /// the middle of a frame, is a failure.
    pub fn is_termination(&self) -> bool {
        match self {
            FrameError::ConnectionClosed => true,
            FrameError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => err,
            FrameError::ConnectionClosed => io::Error::new(io::ErrorKind::WriteZero, err),
            FrameError::Truncated { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            FrameError::FrameTooLarge { .. }
            | FrameError::InvalidChannelId(_)
            | FrameError::UnsupportedVersion(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            FrameError::Protocol(_) => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

use std::io;

/// Errors that can occur in stream and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Frame-level error, including unsupported protocol versions.
    #[error("frame error: {0}")]
    Frame(#[from] h2stream_frame::FrameError),

    /// Two channel names map to the same channel id.
    #[error("channel {name:?} collides with {existing:?} on id {id}")]
    ChannelCollision {
        name: String,
        existing: String,
        id: u32,
    },

    /// The channel name maps to an id that cannot be carried on the wire.
    #[error("channel {name:?} maps to invalid id 0")]
    InvalidChannelId { name: String },

    /// The session has ended; no further channels can be opened.
    #[error("session closed")]
    SessionClosed,

    /// `run` was called on a stream that is already running or has run.
    #[error("stream already running")]
    AlreadyRunning,

    /// The flush thread could not be started.
    #[error("failed to spawn flush thread: {0}")]
    Spawn(#[source] io::Error),

    /// Stream configuration could not be parsed.
    #[error("invalid stream config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MuxError>;

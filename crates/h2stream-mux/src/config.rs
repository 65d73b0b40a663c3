use std::time::Duration;

use h2stream_frame::{FrameConfig, DEFAULT_MAX_WRITE_FRAME, MAX_FRAME_LEN};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default write-coalescing window between flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Session configuration.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Pause after each flush before the next one may run, in milliseconds.
    pub flush_interval_ms: u64,
    /// Largest accepted incoming frame length.
    pub max_read_frame_size: usize,
    /// Largest payload per outgoing frame. Longer channel writes are split.
    pub max_write_frame_size: usize,
    /// Per-channel receive buffer bound in bytes. `None` is unbounded.
    ///
    /// When set, the receive loop blocks while a channel's buffer is full,
    /// which stalls every channel on the session until the reader catches up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_buffer_limit: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
            max_read_frame_size: MAX_FRAME_LEN,
            max_write_frame_size: DEFAULT_MAX_WRITE_FRAME,
            channel_buffer_limit: None,
        }
    }
}

impl StreamConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Codec limits for this session.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_read_frame_size: self.max_read_frame_size,
            max_write_frame_size: self.max_write_frame_size,
        }
    }

    /// Set a per-channel receive buffer bound.
    pub fn with_channel_buffer_limit(mut self, limit: usize) -> Self {
        self.channel_buffer_limit = Some(limit);
        self
    }
}

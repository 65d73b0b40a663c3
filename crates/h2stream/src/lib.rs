//! Many named byte streams over one HTTP/2 DATA-frame connection.
//!
//! h2stream lets independent channels ("stdin", "stdout", "resize", ...)
//! share a single upgraded duplex connection. Each channel write becomes
//! HTTP/2 DATA frames whose stream id is derived from the channel name;
//! the receiving end routes each frame to the channel with that id.
//!
//! # Crate Structure
//!
//! - [`transport`]: Duplex adapter, blocking pipes, Unix socket transport
//! - [`frame`]: DATA frame codec, protocol versions, channel id scheme
//! - [`mux`]: Streams and channels (behind the `mux` feature, on by default)

/// Re-export transport types.
pub mod transport {
    pub use h2stream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use h2stream_frame::*;
}

/// Re-export stream and channel types (requires `mux` feature).
#[cfg(feature = "mux")]
pub mod mux {
    pub use h2stream_mux::*;
}

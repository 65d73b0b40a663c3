//! Named channel multiplexing over one duplex connection.
//!
//! A [`Stream`] owns a [`Duplex`](h2stream_transport::Duplex) and the codec
//! negotiated for it. Callers open named [`Channel`]s, each an ordinary
//! `Read + Write` byte stream, and drive the session with [`Stream::run`]:
//! the calling thread demultiplexes incoming frames into channel buffers
//! while a background thread coalesces flushes of outgoing frames.
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::thread;
//!
//! use h2stream_mux::{CancelToken, Stream};
//! use h2stream_transport::memory_pair;
//!
//! let (left, right) = memory_pair();
//! let client = Stream::client(left, "v5.channel.k8s.io")?;
//! let server = Stream::server(right, "v5.channel.k8s.io")?;
//!
//! let mut tx = client.channel("stdin")?;
//! let mut rx = server.channel("stdin")?;
//!
//! let cancel = CancelToken::new();
//! let token = cancel.clone();
//! let driver = thread::spawn(move || server.run(&token));
//! let token = cancel.clone();
//! let client_driver = thread::spawn(move || client.run(&token));
//!
//! tx.write_all(b"hello")?;
//! let mut buf = [0u8; 5];
//! rx.read_exact(&mut buf)?;
//!
//! cancel.cancel();
//! driver.join().ok();
//! client_driver.join().ok();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
mod flush;
mod registry;
pub mod stream;

pub use cancel::{CancelGuard, CancelToken};
pub use channel::Channel;
pub use config::{StreamConfig, DEFAULT_FLUSH_INTERVAL};
pub use error::{MuxError, Result};
pub use stream::{Side, Stream};

//! Duplex connection adapter and blocking byte pipes.
//!
//! This is the lowest layer of h2stream. It turns independent inbound and
//! outbound byte-stream halves into one [`Duplex`] connection, and provides
//! the [`Pipe`] used to hand received bytes to channel readers.
//!
//! Transports offered here:
//! - [`Duplex::server`] / [`Duplex::client`] for upgraded HTTP exchanges
//! - [`memory_pair`] for in-process sessions
//! - [`UnixDomainSocket`] on Unix platforms

pub mod duplex;
pub mod error;
pub mod pipe;

#[cfg(unix)]
pub mod uds;

pub use duplex::{memory_pair, CloseHandle, Duplex, DuplexReader, DuplexWriter};
pub use error::{Result, TransportError};
pub use pipe::Pipe;

#[cfg(unix)]
pub use uds::UnixDomainSocket;

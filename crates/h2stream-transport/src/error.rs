use std::io;
use std::path::PathBuf;

/// Errors raised while setting up a socket-backed [`Duplex`](crate::Duplex).
///
/// Once a duplex exists, read and write failures surface as plain
/// [`io::Error`]s through its `Read`/`Write` impls.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket path exceeds `sun_path`.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Listening socket could not be created, secured or cleaned up.
    #[error("failed to bind to {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    /// No listener answered at `path`.
    #[error("failed to connect to {path}: {source}")]
    Connect { path: PathBuf, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// A connected socket could not be split into duplex halves.
    #[error("failed to split connection into duplex halves: {0}")]
    Split(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

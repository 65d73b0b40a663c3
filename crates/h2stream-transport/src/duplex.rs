use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::pipe::Pipe;

type CloseFn = Box<dyn FnOnce() -> io::Result<()> + Send>;

/// Shared, idempotent close operation for a duplex connection.
///
/// Only the first call runs the underlying close; later calls return `Ok(())`.
/// Clones share the same state, so any holder can end the connection while
/// another thread is blocked reading from it.
#[derive(Clone)]
pub struct CloseHandle {
    inner: Arc<Mutex<Option<CloseFn>>>,
}

impl CloseHandle {
    /// Wrap a close operation.
    pub fn new(close: impl FnOnce() -> io::Result<()> + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(close)))),
        }
    }

    /// A close operation that does nothing.
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    /// Run the close operation if it has not run yet.
    pub fn close(&self) -> io::Result<()> {
        let close = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match close {
            Some(close) => {
                debug!("closing duplex connection");
                close()
            }
            None => Ok(()),
        }
    }

    /// Whether the close operation has already run.
    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Inbound half of a [`Duplex`].
pub struct DuplexReader {
    inner: Box<dyn Read + Send>,
}

impl Read for DuplexReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for DuplexReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexReader").finish_non_exhaustive()
    }
}

/// Outbound half of a [`Duplex`].
///
/// `write` hands bytes to the underlying primitive and never flushes on its
/// own; `flush` forwards to the primitive's explicit flush, which is a no-op
/// for writers that have none.
pub struct DuplexWriter {
    inner: Box<dyn Write + Send>,
}

impl Write for DuplexWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl fmt::Debug for DuplexWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexWriter").finish_non_exhaustive()
    }
}

/// One logical duplex connection built from independent read and write
/// primitives plus a close operation.
///
/// This is a pure facade: no buffering and no protocol logic. Reads go to
/// the inbound primitive, writes to the outbound one, and nothing is flushed
/// until [`Write::flush`] is called.
pub struct Duplex {
    reader: DuplexReader,
    writer: DuplexWriter,
    closer: CloseHandle,
}

impl Duplex {
    /// Combine a read primitive and a write primitive. Closing is a no-op
    /// until [`Duplex::with_close`] provides one.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            reader: DuplexReader {
                inner: Box::new(reader),
            },
            writer: DuplexWriter {
                inner: Box::new(writer),
            },
            closer: CloseHandle::noop(),
        }
    }

    /// Server side of an upgraded HTTP exchange: read the request body,
    /// write the response.
    ///
    /// Closing does nothing; the exchange ends when the handler returns.
    pub fn server<R, W>(request_body: R, response: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::new(request_body, response)
    }

    /// Client side of an upgraded HTTP exchange: write the streaming request
    /// body, read the response body.
    ///
    /// Pair with [`Duplex::with_close`] to release the response body.
    pub fn client<W, R>(request_body: W, response_body: R) -> Self
    where
        W: Write + Send + 'static,
        R: Read + Send + 'static,
    {
        Self::new(response_body, request_body)
    }

    /// Wrap a connected Unix stream. Closing shuts the socket down in both
    /// directions, which unblocks a reader on any clone of it.
    #[cfg(unix)]
    pub fn from_unix_stream(stream: std::os::unix::net::UnixStream) -> io::Result<Self> {
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        Ok(Self::new(reader, stream).with_close(move || {
            match control.shutdown(std::net::Shutdown::Both) {
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                other => other,
            }
        }))
    }

    /// Replace the close operation.
    pub fn with_close(mut self, close: impl FnOnce() -> io::Result<()> + Send + 'static) -> Self {
        self.closer = CloseHandle::new(close);
        self
    }

    /// Run the close operation (at most once).
    pub fn close(&self) -> io::Result<()> {
        self.closer.close()
    }

    /// A clonable handle to this connection's close operation.
    pub fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    /// Split into independently owned halves so one thread can read while
    /// others write.
    pub fn split(self) -> (DuplexReader, DuplexWriter, CloseHandle) {
        (self.reader, self.writer, self.closer)
    }
}

impl Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl fmt::Debug for Duplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Duplex")
            .field("closer", &self.closer)
            .finish_non_exhaustive()
    }
}

/// Create two connected in-process duplex connections.
///
/// Bytes written to one end are read from the other. Closing either end
/// closes both directions: its own blocked reads return end-of-stream once
/// drained, and the peer's writes fail with [`io::ErrorKind::BrokenPipe`].
pub fn memory_pair() -> (Duplex, Duplex) {
    let a_to_b = Arc::new(Pipe::new());
    let b_to_a = Arc::new(Pipe::new());
    let a = memory_end(&b_to_a, &a_to_b);
    let b = memory_end(&a_to_b, &b_to_a);
    (a, b)
}

fn memory_end(inbound: &Arc<Pipe>, outbound: &Arc<Pipe>) -> Duplex {
    let (inbound_close, outbound_close) = (Arc::clone(inbound), Arc::clone(outbound));
    Duplex::new(PipeEnd(Arc::clone(inbound)), PipeEnd(Arc::clone(outbound))).with_close(move || {
        inbound_close.close();
        outbound_close.close();
        Ok(())
    })
}

struct PipeEnd(Arc<Pipe>);

impl Read for PipeEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for PipeEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

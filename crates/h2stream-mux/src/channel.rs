use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use h2stream_transport::Pipe;

use crate::stream::Shared;

/// One named byte stream within a session.
///
/// Reads drain bytes the peer sent on this channel, in wire order, with no
/// message boundaries. Each write goes out as one or more consecutive DATA
/// frames under the session write lock and is flushed by the session's
/// flush thread shortly after. Writes fail once the session has ended.
///
/// Handles are cheap to clone; clones share the same receive buffer.
#[derive(Clone)]
pub struct Channel {
    name: Arc<str>,
    id: u32,
    pipe: Arc<Pipe>,
    shared: Arc<Shared>,
}

impl Channel {
    pub(crate) fn new(name: &str, id: u32, pipe: Arc<Pipe>, shared: Arc<Shared>) -> Self {
        Self {
            name: Arc::from(name),
            id,
            pipe,
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire id of this channel.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Close the local receive buffer.
    ///
    /// Pending bytes stay readable; later frames for this channel are
    /// dropped. Nothing is sent to the peer.
    pub fn close(&self) {
        self.pipe.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pipe.is_closed()
    }

    /// Bytes received but not yet read.
    pub fn buffered(&self) -> usize {
        self.pipe.buffered()
    }
}

impl Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.pipe.read(buf)
    }
}

impl Write for Channel {
    /// Returns `buf.len()` once every frame is written, or the codec error.
    ///
    /// Fails with [`io::ErrorKind::BrokenPipe`] once the session has made its
    /// last flush.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut sink = self.shared.lock_sink();
        if self.shared.flush.is_stopped() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "h2stream session has ended",
            ));
        }
        self.shared.flush.signal();

        let chunk_size = sink.max_frame_size().max(1);
        for chunk in buf.chunks(chunk_size) {
            sink.write_frame(self.id, chunk)?;
        }
        Ok(buf.len())
    }

    /// Schedules a flush; does not wait for it.
    fn flush(&mut self) -> io::Result<()> {
        self.shared.flush.signal();
        Ok(())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("closed", &self.pipe.is_closed())
            .finish()
    }
}

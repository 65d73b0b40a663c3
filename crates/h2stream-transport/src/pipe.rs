use std::io::{self, Read, Write};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, BytesMut};

/// An in-process byte queue with blocking reads.
///
/// Writes append to one buffer and wake a single waiting reader. Reads block
/// while the buffer is empty and the pipe is open, then drain bytes in FIFO
/// order with no regard for write boundaries: one write may be returned by
/// several reads and several writes by one read.
///
/// After [`Pipe::close`], readers drain whatever is still buffered and then
/// observe end-of-stream (`Ok(0)`); writers fail with
/// [`io::ErrorKind::BrokenPipe`].
///
/// Pipes are unbounded by default, so writers never block. A pipe created
/// with [`Pipe::bounded`] holds at most `limit` bytes and blocks writers
/// while it is full.
#[derive(Debug)]
pub struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
    writable: Condvar,
    limit: Option<usize>,
}

#[derive(Debug, Default)]
struct PipeState {
    buf: BytesMut,
    closed: bool,
}

impl Pipe {
    /// Create an unbounded pipe.
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Create a pipe that buffers at most `limit` bytes (minimum 1).
    pub fn bounded(limit: usize) -> Self {
        Self::with_limit(Some(limit.max(1)))
    }

    /// Create a pipe with an optional buffer limit.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            state: Mutex::new(PipeState::default()),
            readable: Condvar::new(),
            writable: Condvar::new(),
            limit: limit.map(|limit| limit.max(1)),
        }
    }

    /// Read buffered bytes into `buf`, blocking until data arrives or the
    /// pipe is closed.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.lock();
        loop {
            if !state.buf.is_empty() {
                let n = buf.len().min(state.buf.len());
                buf[..n].copy_from_slice(&state.buf[..n]);
                state.buf.advance(n);

                // Leftover bytes belong to the next waiting reader.
                if !state.buf.is_empty() {
                    self.readable.notify_one();
                }
                if self.limit.is_some() {
                    self.writable.notify_one();
                }
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Append `buf` to the pipe and wake one blocked reader.
    ///
    /// Unbounded pipes accept the whole buffer. Bounded pipes accept as much
    /// as fits, blocking only while no room is left.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(closed_pipe());
            }

            let room = match self.limit {
                None => buf.len(),
                Some(limit) => limit.saturating_sub(state.buf.len()).min(buf.len()),
            };
            if room > 0 || buf.is_empty() {
                state.buf.extend_from_slice(&buf[..room]);
                self.readable.notify_one();
                return Ok(room);
            }

            state = self
                .writable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark the pipe closed and wake every blocked reader and writer.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// Whether [`Pipe::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.lock().buf.len()
    }

    /// Configured buffer limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for &Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Pipe::read(self, buf)
    }
}

impl Write for &Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Pipe::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "write on closed pipe")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn read_returns_written_bytes() {
        let pipe = Pipe::new();
        assert_eq!(pipe.write(b"hello").unwrap(), 5);

        let mut buf = [0u8; 16];
        let n = pipe.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn single_write_split_across_reads() {
        let pipe = Pipe::new();
        pipe.write(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(pipe.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn several_writes_merged_into_one_read() {
        let pipe = Pipe::new();
        pipe.write(b"ab").unwrap();
        pipe.write(b"cd").unwrap();
        pipe.write(b"ef").unwrap();

        let mut buf = [0u8; 8];
        let n = pipe.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcdef");
    }

    #[test]
    fn write_after_close_fails() {
        let pipe = Pipe::new();
        pipe.close();

        let err = pipe.write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn closed_pipe_drains_then_reports_eof() {
        let pipe = Pipe::new();
        pipe.write(b"tail").unwrap();
        pipe.close();

        let mut buf = [0u8; 8];
        let n = pipe.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"tail");
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn empty_read_buffer_does_not_block() {
        let pipe = Pipe::new();
        let mut buf = [0u8; 0];
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn blocked_reader_wakes_on_write() {
        let pipe = Arc::new(Pipe::new());
        let reader = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                let mut buf = [0u8; 8];
                let n = pipe.read(&mut buf).unwrap();
                buf[..n].to_vec()
            })
        };

        thread::sleep(Duration::from_millis(20));
        pipe.write(b"wake").unwrap();

        assert_eq!(reader.join().unwrap(), b"wake");
    }

    #[test]
    fn close_wakes_all_blocked_readers() {
        let pipe = Arc::new(Pipe::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let pipe = Arc::clone(&pipe);
                thread::spawn(move || {
                    let mut buf = [0u8; 8];
                    pipe.read(&mut buf).unwrap()
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        pipe.close();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), 0);
        }
    }

    #[test]
    fn bounded_pipe_accepts_partial_write() {
        let pipe = Pipe::bounded(4);
        assert_eq!(pipe.write(b"abcdef").unwrap(), 4);
        assert_eq!(pipe.buffered(), 4);
    }

    #[test]
    fn bounded_writer_blocks_until_reader_drains() {
        let pipe = Arc::new(Pipe::bounded(2));
        pipe.write(b"ab").unwrap();

        let writer = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                let mut sink: &Pipe = &pipe;
                sink.write_all(b"cd").unwrap();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(pipe.buffered(), 2);

        let mut out = Vec::new();
        let mut buf = [0u8; 1];
        while out.len() < 4 {
            let n = pipe.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        writer.join().unwrap();
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn close_unblocks_bounded_writer() {
        let pipe = Arc::new(Pipe::bounded(1));
        pipe.write(b"x").unwrap();

        let writer = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || pipe.write(b"y"))
        };

        thread::sleep(Duration::from_millis(20));
        pipe.close();

        let err = writer.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn concurrent_writers_lose_no_bytes() {
        let pipe = Arc::new(Pipe::new());
        let writers: Vec<_> = (0..8u8)
            .map(|id| {
                let pipe = Arc::clone(&pipe);
                thread::spawn(move || {
                    for _ in 0..100 {
                        pipe.write(&[id]).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        pipe.close();

        let mut all = Vec::new();
        (&*pipe).read_to_end(&mut all).unwrap();
        assert_eq!(all.len(), 800);
        for id in 0..8u8 {
            assert_eq!(all.iter().filter(|b| **b == id).count(), 100);
        }
    }
}

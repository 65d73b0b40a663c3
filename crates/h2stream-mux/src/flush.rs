use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use h2stream_frame::{FrameError, FrameSink};
use h2stream_transport::CloseHandle;
use tracing::{debug, warn};

#[derive(Default)]
struct FlushState {
    pending: bool,
    shutdown: bool,
    /// Set under the sink lock after the last flush. Writes that see it
    /// would never reach the wire.
    stopped: bool,
}

/// Coalesces flush requests from channel writers.
///
/// At most one request is pending at a time; signalling while one is pending
/// is a no-op. After each flush the loop pauses for `interval` so bursts of
/// writes share a single flush.
pub(crate) struct FlushScheduler {
    state: Mutex<FlushState>,
    wake: Condvar,
    interval: Duration,
}

impl FlushScheduler {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(FlushState::default()),
            wake: Condvar::new(),
            interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlushState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a flush without blocking.
    pub(crate) fn signal(&self) {
        let mut state = self.lock();
        if !state.pending {
            state.pending = true;
            self.wake.notify_one();
        }
    }

    /// Stop the loop, interrupting any coalescing pause.
    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.wake.notify_all();
    }

    /// Whether the loop has made its last flush.
    pub(crate) fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Flush once on start and once per signal until shut down, then flush
    /// whatever is still buffered and close the connection.
    ///
    /// Returns the first flush failure; closed-connection errors end the
    /// loop quietly.
    pub(crate) fn run(
        &self,
        sink: &Mutex<Box<dyn FrameSink>>,
        closer: &CloseHandle,
    ) -> Option<FrameError> {
        self.signal();
        let mut failure = None;
        let mut writable = true;

        loop {
            {
                let state = self.lock();
                let mut state = self
                    .wake
                    .wait_while(state, |state| !state.pending && !state.shutdown)
                    .unwrap_or_else(PoisonError::into_inner);
                if state.shutdown {
                    break;
                }
                state.pending = false;
            }

            let flushed = sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush();
            match flushed {
                Ok(()) => {}
                Err(err) if err.is_termination() => {
                    debug!(error = %err, "connection closed during flush");
                    writable = false;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "flush failed");
                    failure = Some(err);
                    writable = false;
                    break;
                }
            }

            let state = self.lock();
            let (state, _) = self
                .wake
                .wait_timeout_while(state, self.interval, |state| !state.shutdown)
                .unwrap_or_else(PoisonError::into_inner);
            if state.shutdown {
                break;
            }
        }

        {
            let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
            if writable {
                match sink.flush() {
                    Ok(()) => {}
                    Err(err) if err.is_termination() => {
                        debug!(error = %err, "connection closed before final flush");
                    }
                    Err(err) => {
                        warn!(error = %err, "final flush failed");
                        failure = Some(err);
                    }
                }
            }
            self.lock().stopped = true;
        }

        if let Err(err) = closer.close() {
            warn!(error = %err, "failed to close connection");
        }
        failure
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use h2stream_frame::Result as FrameResult;

    use super::*;

    #[derive(Clone, Default)]
    struct CountingSink {
        flushes: Arc<AtomicUsize>,
        fail_with: Option<std::io::ErrorKind>,
    }

    impl FrameSink for CountingSink {
        fn write_frame(&mut self, _channel: u32, _payload: &[u8]) -> FrameResult<()> {
            Ok(())
        }

        fn flush(&mut self) -> FrameResult<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(kind) => Err(FrameError::Io(kind.into())),
                None => Ok(()),
            }
        }

        fn max_frame_size(&self) -> usize {
            16
        }
    }

    fn boxed(sink: &CountingSink) -> Mutex<Box<dyn FrameSink>> {
        Mutex::new(Box::new(sink.clone()))
    }

    #[test]
    fn flushes_on_start_and_closes_on_shutdown() {
        let scheduler = Arc::new(FlushScheduler::new(Duration::from_millis(5)));
        let counter = CountingSink::default();
        let sink = boxed(&counter);
        let closer = CloseHandle::new(|| Ok(()));

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            let closer = closer.clone();
            thread::spawn(move || scheduler.run(&sink, &closer))
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!scheduler.is_stopped());
        scheduler.shutdown();
        assert!(handle.join().expect("flush loop should finish").is_none());
        // Start flush plus the final one.
        assert_eq!(counter.flushes.load(Ordering::SeqCst), 2);
        assert!(scheduler.is_stopped());
        assert!(closer.is_closed());
    }

    #[test]
    fn signals_coalesce_within_interval() {
        let scheduler = Arc::new(FlushScheduler::new(Duration::from_millis(200)));
        let counter = CountingSink::default();
        let sink = boxed(&counter);
        let closer = CloseHandle::noop();

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.run(&sink, &closer))
        };

        thread::sleep(Duration::from_millis(20));
        for _ in 0..50 {
            scheduler.signal();
        }
        thread::sleep(Duration::from_millis(20));
        scheduler.shutdown();
        handle.join().expect("flush loop should finish");

        // The burst is still pending when shutdown lands; the final flush
        // covers it.
        assert_eq!(counter.flushes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shutdown_interrupts_pause() {
        let scheduler = Arc::new(FlushScheduler::new(Duration::from_secs(30)));
        let sink = boxed(&CountingSink::default());
        let closer = CloseHandle::noop();

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.run(&sink, &closer))
        };

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        scheduler.shutdown();
        handle.join().expect("flush loop should finish");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn flush_failure_is_reported() {
        let scheduler = FlushScheduler::new(Duration::from_millis(5));
        let counter = CountingSink {
            fail_with: Some(std::io::ErrorKind::ConnectionReset),
            ..CountingSink::default()
        };
        let closer = CloseHandle::new(|| Ok(()));

        let failure = scheduler.run(&boxed(&counter), &closer);
        assert!(matches!(failure, Some(FrameError::Io(_))));
        assert_eq!(counter.flushes.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_stopped());
        assert!(closer.is_closed());
    }

    #[test]
    fn closed_connection_during_flush_is_quiet() {
        let scheduler = FlushScheduler::new(Duration::from_millis(5));
        let counter = CountingSink {
            fail_with: Some(std::io::ErrorKind::BrokenPipe),
            ..CountingSink::default()
        };

        let failure = scheduler.run(&boxed(&counter), &CloseHandle::noop());
        assert!(failure.is_none());
    }
}

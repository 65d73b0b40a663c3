use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use h2stream_frame::{ChannelIds, Fnv1Ids, FrameSink, FrameSource, ProtocolVersion};
use h2stream_transport::{CloseHandle, Duplex};
use tracing::{debug, trace, warn};

use crate::cancel::CancelToken;
use crate::channel::Channel;
use crate::config::StreamConfig;
use crate::error::{MuxError, Result};
use crate::flush::FlushScheduler;
use crate::registry::Registry;

/// Which end of the upgraded connection a stream is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Server,
    Client,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Server => "server",
            Side::Client => "client",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between a stream, its channels and its flush thread.
pub(crate) struct Shared {
    side: Side,
    version: ProtocolVersion,
    config: StreamConfig,
    /// The session write lock. Guards frame writes and flushes.
    sink: Mutex<Box<dyn FrameSink>>,
    /// Taken by the first `run`.
    source: Mutex<Option<Box<dyn FrameSource>>>,
    closer: CloseHandle,
    pub(crate) registry: Registry,
    pub(crate) flush: FlushScheduler,
}

impl Shared {
    pub(crate) fn lock_sink(&self) -> MutexGuard<'_, Box<dyn FrameSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Many named channels multiplexed over one duplex connection.
///
/// Create channels with [`Stream::channel`], then drive the session with
/// [`Stream::run`] on a dedicated thread. Channels may be created before or
/// after `run` starts; frames for ids with no channel are dropped.
pub struct Stream {
    shared: Arc<Shared>,
}

impl Stream {
    /// Server end of a session negotiated at `version`.
    pub fn server(duplex: Duplex, version: &str) -> Result<Self> {
        Self::with_config(Side::Server, duplex, version, StreamConfig::default())
    }

    /// Client end of a session negotiated at `version`.
    pub fn client(duplex: Duplex, version: &str) -> Result<Self> {
        Self::with_config(Side::Client, duplex, version, StreamConfig::default())
    }

    pub fn with_config(
        side: Side,
        duplex: Duplex,
        version: &str,
        config: StreamConfig,
    ) -> Result<Self> {
        Self::with_channel_ids(side, duplex, version, config, Arc::new(Fnv1Ids))
    }

    /// Full constructor with an explicit channel id scheme.
    ///
    /// Both ends of a session must use the same scheme.
    pub fn with_channel_ids(
        side: Side,
        duplex: Duplex,
        version: &str,
        config: StreamConfig,
        ids: Arc<dyn ChannelIds>,
    ) -> Result<Self> {
        let version: ProtocolVersion = version.parse()?;
        let codec = version.bind(duplex, &config.frame_config());
        debug!(
            side = %side,
            version = %version,
            scheme = ids.scheme(),
            "stream created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                side,
                version,
                sink: Mutex::new(codec.sink),
                source: Mutex::new(Some(codec.source)),
                closer: codec.closer,
                registry: Registry::new(ids, config.channel_buffer_limit),
                flush: FlushScheduler::new(config.flush_interval()),
                config,
            }),
        })
    }

    pub fn side(&self) -> Side {
        self.shared.side
    }

    pub fn version(&self) -> ProtocolVersion {
        self.shared.version
    }

    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    /// The id `name` maps to under this stream's scheme.
    pub fn channel_id(&self, name: &str) -> u32 {
        self.shared.registry.channel_id(name)
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Open the channel `name`.
    ///
    /// Asking for the same name again returns another handle to the same
    /// channel. Fails if a different name already owns the id, if the name
    /// maps to id 0, or once the session has ended.
    pub fn channel(&self, name: &str) -> Result<Channel> {
        let (id, pipe) = self.shared.registry.register(name)?;
        Ok(Channel::new(name, id, pipe, Arc::clone(&self.shared)))
    }

    /// Drive the session until the connection ends or `cancel` fires.
    ///
    /// Starts the flush thread and runs the receive loop on the calling
    /// thread. Returns `Ok(())` when the connection terminates cleanly and
    /// the failure otherwise. Bytes already written are flushed before the
    /// connection closes. On return every channel is closed, so blocked
    /// readers see end-of-stream and later writes fail with
    /// [`std::io::ErrorKind::BrokenPipe`].
    pub fn run(&self, cancel: &CancelToken) -> Result<()> {
        let mut source = self
            .shared
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(MuxError::AlreadyRunning)?;

        let flusher = {
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name("h2stream-flush".to_string())
                .spawn(move || shared.flush.run(&shared.sink, &shared.closer))
                .map_err(MuxError::Spawn)?
        };

        let _cancel_guard = {
            let shared = Arc::clone(&self.shared);
            cancel.on_cancel(move || {
                shared.flush.shutdown();
                // Unblocks a receive loop waiting on a full bounded pipe.
                shared.registry.close_all();
            })
        };

        debug!(
            side = %self.shared.side,
            channels = self.shared.registry.len(),
            "stream running"
        );
        let received = self.receive_loop(source.as_mut());

        self.shared.flush.shutdown();
        let flush_failure = match flusher.join() {
            Ok(failure) => failure,
            Err(_) => {
                warn!("flush thread panicked");
                None
            }
        };
        self.shared.registry.close_all();

        debug!(
            side = %self.shared.side,
            ok = received.is_ok() && flush_failure.is_none(),
            "stream stopped"
        );
        received?;
        match flush_failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn receive_loop(&self, source: &mut dyn FrameSource) -> Result<()> {
        loop {
            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(err) if err.is_termination() => return Ok(()),
                Err(err) => return Err(err.into()),
            };

            let Some(pipe) = self.shared.registry.lookup(frame.channel) else {
                trace!(
                    channel = frame.channel,
                    size = frame.payload.len(),
                    "dropping frame for unknown channel"
                );
                continue;
            };

            if let Err(err) = (&*pipe).write_all(&frame.payload) {
                trace!(
                    channel = frame.channel,
                    size = frame.payload.len(),
                    error = %err,
                    "dropping frame for closed channel"
                );
            }
        }
    }

    /// Flush once, synchronously. The connection stays open.
    pub fn close(&self) -> Result<()> {
        match self.shared.lock_sink().flush() {
            Err(err) if err.is_termination() => Ok(()),
            other => other.map_err(MuxError::from),
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("side", &self.shared.side)
            .field("version", &self.shared.version)
            .field("channels", &self.shared.registry.len())
            .field("scheme", &self.shared.registry.scheme())
            .finish()
    }
}

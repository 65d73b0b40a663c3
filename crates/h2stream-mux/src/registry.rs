use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use h2stream_frame::ChannelIds;
use h2stream_transport::Pipe;
use tracing::debug;

use crate::error::{MuxError, Result};

struct Entry {
    name: String,
    pipe: Arc<Pipe>,
}

#[derive(Default)]
struct Channels {
    entries: HashMap<u32, Entry>,
    closed: bool,
}

/// Channel id -> receive pipe map for one session.
///
/// Lookups from the receive loop take the read lock; registration takes the
/// write lock. Independent of the session write lock.
pub(crate) struct Registry {
    ids: Arc<dyn ChannelIds>,
    buffer_limit: Option<usize>,
    channels: RwLock<Channels>,
}

impl Registry {
    pub(crate) fn new(ids: Arc<dyn ChannelIds>, buffer_limit: Option<usize>) -> Self {
        Self {
            ids,
            buffer_limit,
            channels: RwLock::new(Channels::default()),
        }
    }

    pub(crate) fn channel_id(&self, name: &str) -> u32 {
        self.ids.channel_id(name)
    }

    pub(crate) fn scheme(&self) -> &'static str {
        self.ids.scheme()
    }

    /// Register `name`, or return the existing registration for it.
    pub(crate) fn register(&self, name: &str) -> Result<(u32, Arc<Pipe>)> {
        let id = self.ids.channel_id(name);
        if id == 0 {
            return Err(MuxError::InvalidChannelId {
                name: name.to_string(),
            });
        }

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.closed {
            return Err(MuxError::SessionClosed);
        }
        if let Some(entry) = channels.entries.get(&id) {
            if entry.name == name {
                return Ok((id, Arc::clone(&entry.pipe)));
            }
            return Err(MuxError::ChannelCollision {
                name: name.to_string(),
                existing: entry.name.clone(),
                id,
            });
        }

        let pipe = Arc::new(Pipe::with_limit(self.buffer_limit));
        channels.entries.insert(
            id,
            Entry {
                name: name.to_string(),
                pipe: Arc::clone(&pipe),
            },
        );
        debug!(name, channel = id, "channel registered");
        Ok((id, pipe))
    }

    pub(crate) fn lookup(&self, id: u32) -> Option<Arc<Pipe>> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels.entries.get(&id).map(|entry| Arc::clone(&entry.pipe))
    }

    /// Close every registered pipe and refuse further registrations.
    pub(crate) fn close_all(&self) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels.closed = true;
        for entry in channels.entries.values() {
            entry.pipe.close();
        }
    }

    pub(crate) fn len(&self) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use h2stream_frame::Fnv1Ids;

    use super::*;

    /// Maps every name to its length, so collisions are easy to build.
    struct LengthIds;

    impl ChannelIds for LengthIds {
        fn channel_id(&self, name: &str) -> u32 {
            name.len() as u32
        }

        fn scheme(&self) -> &'static str {
            "length"
        }
    }

    #[test]
    fn same_name_returns_same_pipe() {
        let registry = Registry::new(Arc::new(Fnv1Ids), None);
        let (id_a, pipe_a) = registry.register("stdout").unwrap();
        let (id_b, pipe_b) = registry.register("stdout").unwrap();

        assert_eq!(id_a, id_b);
        assert!(Arc::ptr_eq(&pipe_a, &pipe_b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_name_same_id_collides() {
        let registry = Registry::new(Arc::new(LengthIds), None);
        registry.register("ab").unwrap();

        let err = registry.register("cd").unwrap_err();
        assert!(matches!(
            err,
            MuxError::ChannelCollision { ref name, ref existing, id: 2 }
                if name == "cd" && existing == "ab"
        ));
    }

    #[test]
    fn zero_id_rejected() {
        let registry = Registry::new(Arc::new(LengthIds), None);
        let err = registry.register("").unwrap_err();
        assert!(matches!(err, MuxError::InvalidChannelId { .. }));
    }

    #[test]
    fn close_all_closes_pipes_and_refuses_new_channels() {
        let registry = Registry::new(Arc::new(Fnv1Ids), None);
        let (_, pipe) = registry.register("a").unwrap();

        registry.close_all();
        assert!(pipe.is_closed());
        assert!(matches!(
            registry.register("b").unwrap_err(),
            MuxError::SessionClosed
        ));
    }

    #[test]
    fn pipes_honour_buffer_limit() {
        let registry = Registry::new(Arc::new(Fnv1Ids), Some(64));
        let (_, pipe) = registry.register("a").unwrap();
        assert_eq!(pipe.limit(), Some(64));
        assert!(registry.lookup(channel_id_of("a")).is_some());
        assert!(registry.lookup(channel_id_of("b")).is_none());
    }

    fn channel_id_of(name: &str) -> u32 {
        h2stream_frame::channel_id(name)
    }
}

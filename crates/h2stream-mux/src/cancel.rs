//! Blocking cancellation token.
//!
//! A session is torn down by cancelling the token passed to
//! [`Stream::run`](crate::Stream::run). Clones share state: cancelling any
//! clone cancels all of them and runs every registered callback exactly
//! once.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    cancelled: bool,
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared cancellation signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token. Idempotent.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.inner.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };
        for (_, callback) in callbacks {
            callback();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// Run `callback` when the token is cancelled.
    ///
    /// Runs immediately on the calling thread if the token is already
    /// cancelled. Dropping the returned guard before cancellation
    /// deregisters the callback.
    pub fn on_cancel(&self, callback: impl FnOnce() + Send + 'static) -> CancelGuard {
        let mut state = self.inner.lock();
        if state.cancelled {
            drop(state);
            callback();
            return CancelGuard {
                inner: Arc::clone(&self.inner),
                id: None,
            };
        }
        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.push((id, Box::new(callback)));
        CancelGuard {
            inner: Arc::clone(&self.inner),
            id: Some(id),
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Registration returned by [`CancelToken::on_cancel`].
#[must_use = "dropping the guard deregisters the callback"]
pub struct CancelGuard {
    inner: Arc<Inner>,
    id: Option<u64>,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.inner.lock().callbacks.retain(|(cb_id, _)| *cb_id != id);
        }
    }
}

//! Cancellation scopes.
//!
//! A [`Scope`] is the caller-owned lifetime that accessor instances bind their
//! resources to. Cancelling it fires every teardown registered with
//! [`Scope::on_cancel`]; [`Scope::close`] additionally waits for those
//! teardowns to finish.

use crate::error::AccessorResult;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A watcher thread, joined by whichever of its scope or its guard gets to
/// it first.
type Watcher = Arc<Mutex<Option<JoinHandle<()>>>>;

fn join_watcher(watcher: &Watcher) {
    let handle = match watcher.lock().take() {
        Some(h) => h,
        None => return,
    };
    // A teardown may release the last reference to its owner from the
    // watcher thread itself.
    if handle.thread().id() == std::thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!("scope: teardown watcher panicked");
    }
}

struct ScopeInner {
    token: CancellationToken,
    watchers: Mutex<Vec<Watcher>>,
}

impl ScopeInner {
    fn join_watchers(&self) {
        let watchers = std::mem::take(&mut *self.watchers.lock());
        for watcher in &watchers {
            join_watcher(watcher);
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.token.cancel();
        self.join_watchers();
    }
}

/// Ties a registered teardown to its owner.
///
/// Dropping the guard fires the teardown (if the scope has not already) and
/// waits for it.
pub struct TeardownGuard {
    token: CancellationToken,
    watcher: Watcher,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.token.cancel();
        join_watcher(&self.watcher);
    }
}

/// A cancellation scope shared by clones.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .field("watchers", &self.inner.watchers.lock().len())
            .finish()
    }
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            inner: Arc::new(ScopeInner {
                token: CancellationToken::new(),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Signal cancellation without waiting for teardowns.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The underlying token, for callers that want to select on it.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Run `f` once, on a watcher thread, when this scope is cancelled or the
    /// returned guard is dropped, whichever happens first.
    ///
    /// If the scope is already cancelled, `f` runs promptly.
    pub fn on_cancel<F>(&self, f: F) -> AccessorResult<TeardownGuard>
    where
        F: FnOnce() + Send + 'static,
    {
        let child = self.inner.token.child_token();
        let waiter = child.clone();
        let handle = std::thread::Builder::new()
            .name("scope-teardown".into())
            .spawn(move || {
                futures::executor::block_on(waiter.cancelled());
                f();
            })?;
        let watcher: Watcher = Arc::new(Mutex::new(Some(handle)));

        let mut watchers = self.inner.watchers.lock();
        watchers.retain(|w| w.lock().as_ref().is_some_and(|h| !h.is_finished()));
        watchers.push(watcher.clone());
        debug!("scope: registered teardown watcher ({} live)", watchers.len());

        Ok(TeardownGuard {
            token: child,
            watcher,
        })
    }

    /// Cancel the scope and wait for every registered teardown to complete.
    pub fn close(&self) {
        self.inner.token.cancel();
        self.inner.join_watchers();
    }
}

//! # Outstanding Pipeline Tracking
//!
//! Counts analysis pipelines that are still in flight for a session and
//! lets the finalizer wait until the count reaches zero. The counter is
//! incremented before a pipeline task is spawned and decremented by an RAII
//! guard when the task exits, so a task that panics still releases its slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    idle: Notify,
}

/// Shared counter of in-flight pipeline tasks for one session.
#[derive(Debug, Clone, Default)]
pub struct PipelineTracker {
    inner: Arc<Inner>,
}

impl PipelineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one in-flight pipeline. Call before spawning the task and
    /// move the returned guard into it.
    pub fn register(&self) -> PipelineGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        PipelineGuard { inner: Arc::clone(&self.inner) }
    }

    /// Number of pipelines currently in flight.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Suspend until every registered pipeline has finished. Returns
    /// immediately if none are in flight.
    pub async fn wait_idle(&self) {
        loop {
            // Register interest before re-checking the counter so a guard
            // dropped between the check and the await cannot be missed.
            let notified = self.inner.idle.notified();
            if self.inner.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII handle for one in-flight pipeline; releases its slot on drop.
#[derive(Debug)]
pub struct PipelineGuard {
    inner: Arc<Inner>,
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

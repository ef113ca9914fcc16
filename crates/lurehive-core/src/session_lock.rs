//! Per-conversation mutual exclusion.
//!
//! Every load → mutate → persist cycle on a session runs under that session's
//! lock, so two messages for the same conversation never interleave and the
//! finalize decision is taken at most once.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Default)]
pub struct SessionLockManager {
    locks: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
    /// Caps how many conversations are processed at once
    global: Option<Arc<Semaphore>>,
}

impl SessionLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent(max_concurrent: Option<usize>) -> Self {
        Self {
            locks: Arc::default(),
            global: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    async fn semaphore_for(&self, session_id: &str) -> Arc<Semaphore> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn acquire(&self, session_id: &str) -> Result<SessionGuard> {
        let global = match &self.global {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .context("global session limiter closed")?,
            ),
            None => None,
        };

        let permit = self
            .semaphore_for(session_id)
            .await
            .acquire_owned()
            .await
            .with_context(|| format!("lock for session {session_id} closed"))?;

        Ok(SessionGuard {
            _permit: permit,
            _global: global,
        })
    }

    /// Forget the locks of the given sessions unless somebody holds or awaits them.
    pub async fn release(&self, session_ids: &[String]) {
        let mut locks = self.locks.lock().await;
        for id in session_ids {
            if locks.get(id).is_some_and(is_unused) {
                locks.remove(id);
            }
        }
    }

    /// Drop every unused lock. Returns how many were removed.
    pub async fn release_idle(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, sem| !is_unused(sem));
        before - locks.len()
    }
}

/// The map holds the only handle, so no caller holds the permit or is about to wait on it.
fn is_unused(sem: &Arc<Semaphore>) -> bool {
    Arc::strong_count(sem) == 1 && sem.available_permits() == 1
}

/// Held for the duration of one session operation.
pub struct SessionGuard {
    _permit: OwnedSemaphorePermit,
    _global: Option<OwnedSemaphorePermit>,
}

//! Per-server mutual exclusion.
//!
//! Every lifecycle operation holds the lock of the server it mutates for its
//! whole duration, including the container engine calls. Operations on
//! different servers never contend.
//!
//! The registry lazily creates one `tokio::sync::Mutex` per server id. A
//! [`ServerLock`] is an owned guard: dropping it (or passing it to
//! [`LockRegistry::release`]) frees the server, so early returns, errors and
//! unwinding tasks all release the lock.
//!
//! No fairness is guaranteed between waiters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Lock acquisition failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The lock was not freed within the allowed time.
    #[error("server {id} is busy (waited {waited:?})")]
    Timeout { id: Uuid, waited: Duration },
}

/// Exclusive hold on one server.
#[derive(Debug)]
pub struct ServerLock {
    id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl ServerLock {
    /// The server this lock belongs to.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Registry of per-server locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    entries: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<AsyncMutex<()>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the mutex for `id`, inserting one if absent.
    fn entry(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.entries()
                .entry(id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait up to `timeout` for the lock of `id`.
    pub async fn acquire(&self, id: Uuid, timeout: Duration) -> Result<ServerLock, LockError> {
        let mutex = self.entry(id);
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(server_id = %id, "lock acquired");
                Ok(ServerLock { id, _guard: guard })
            }
            Err(_) => {
                debug!(server_id = %id, ?timeout, "lock acquisition timed out");
                Err(LockError::Timeout {
                    id,
                    waited: timeout,
                })
            }
        }
    }

    /// Take the lock of `id` only if it is free right now.
    pub fn try_acquire(&self, id: Uuid) -> Option<ServerLock> {
        let mutex = self.entry(id);
        mutex
            .try_lock_owned()
            .ok()
            .map(|guard| ServerLock { id, _guard: guard })
    }

    /// Release a lock.
    pub fn release(&self, lock: ServerLock) {
        debug!(server_id = %lock.id, "lock released");
        drop(lock);
    }

    /// Forget the entry of a permanently deleted server.
    ///
    /// A caller still holding or waiting on the old entry keeps working on it;
    /// the next `acquire` for `id` starts from a fresh entry.
    pub fn remove(&self, id: &Uuid) {
        self.entries().remove(id);
    }

    /// Whether `id` is currently locked.
    pub fn is_locked(&self, id: &Uuid) -> bool {
        self.entries()
            .get(id)
            .map(|mutex| mutex.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

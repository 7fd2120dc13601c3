//! Write-coalescing queue for record mutations
//!
//! Mutations are keyed by `(store, id)`; a newer mutation for the same key
//! replaces the queued one (last-write-wins within the debounce window).
//! Any enqueue pushes the single flush deadline out by the fixed debounce
//! delay; when it fires, the whole pending map is swapped out under the
//! lock and processed sequentially, so writes arriving mid-flush land in a
//! fresh queue instead of racing the in-flight one.
//!
//! Failure policy: a write enqueued (or still pending at flush time) while
//! the vault is locked is dropped for that cycle with a warning. This is
//! accepted data-loss-on-lock behavior, not a bug. Deletes never pass
//! through this queue.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{VaultError, VaultResult};
use crate::session::VaultSession;

use super::records::RecordStore;

struct QueueState {
    pending: HashMap<(String, String), Vec<u8>>,
    deadline: Option<Instant>,
    shutdown: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    cvar: Condvar,
    records: Arc<RecordStore>,
    session: Arc<VaultSession>,
    debounce: Duration,
}

/// Debounced, key-coalescing write queue in front of a [`RecordStore`]
pub struct WriteQueue {
    inner: Arc<Inner>,
    worker: Option<JoinHandle<()>>,
}

impl WriteQueue {
    /// Create a queue with its background flush worker
    pub fn new(
        records: Arc<RecordStore>,
        session: Arc<VaultSession>,
        debounce: Duration,
    ) -> VaultResult<Self> {
        let inner = Arc::new(Inner {
            state: Mutex::new(QueueState {
                pending: HashMap::new(),
                deadline: None,
                shutdown: false,
            }),
            cvar: Condvar::new(),
            records,
            session,
            debounce,
        });

        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::Builder::new()
            .name("vault-write-queue".into())
            .spawn(move || worker_loop(worker_inner))
            .map_err(|e| VaultError::Storage(format!("Failed to spawn queue worker: {}", e)))?;

        Ok(Self {
            inner,
            worker: Some(worker),
        })
    }

    /// Queue a mutation, replacing any pending write for the same key and
    /// rescheduling the flush
    ///
    /// If the vault is locked the write is dropped for this cycle.
    pub fn enqueue<T: Serialize>(&self, store: &str, id: &str, data: &T) -> VaultResult<()> {
        if !self.inner.session.is_unlocked() {
            tracing::warn!(store, id, "vault locked, dropping queued write");
            return Ok(());
        }

        let bytes = serde_json::to_vec(data)?;

        let mut state = self.lock_state()?;
        state.pending.insert((store.to_string(), id.to_string()), bytes);
        state.deadline = Some(Instant::now() + self.inner.debounce);
        self.inner.cvar.notify_one();
        Ok(())
    }

    /// Delete a record immediately, bypassing the debounce window
    ///
    /// Also discards any pending write for the same key so a queued put
    /// cannot resurrect the record at the next flush.
    pub fn delete(&self, store: &str, id: &str) -> VaultResult<bool> {
        {
            let mut state = self.lock_state()?;
            state.pending.remove(&(store.to_string(), id.to_string()));
        }
        self.inner.records.delete(store, id)
    }

    /// Flush everything pending right now, on the caller's thread
    pub fn flush_now(&self) -> VaultResult<()> {
        let batch = {
            let mut state = self.lock_state()?;
            state.deadline = None;
            std::mem::take(&mut state.pending)
        };
        flush_batch(&self.inner, batch);
        Ok(())
    }

    /// Number of writes currently pending
    pub fn pending_len(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|state| state.pending.len())
            .unwrap_or(0)
    }

    fn lock_state(&self) -> VaultResult<std::sync::MutexGuard<'_, QueueState>> {
        self.inner
            .state
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire queue lock: {}", e)))
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        let _ = self.flush_now();
        if let Ok(mut state) = self.inner.state.lock() {
            state.shutdown = true;
            self.inner.cvar.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(inner: Arc<Inner>) {
    let mut state = match inner.state.lock() {
        Ok(state) => state,
        Err(_) => return,
    };

    loop {
        if state.shutdown {
            return;
        }

        match state.deadline {
            None => {
                state = match inner.cvar.wait(state) {
                    Ok(state) => state,
                    Err(_) => return,
                };
            }
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    state = match inner.cvar.wait_timeout(state, deadline - now) {
                        Ok((state, _)) => state,
                        Err(_) => return,
                    };
                    continue;
                }

                // Deadline reached: swap the queue out atomically before
                // flushing so new enqueues start a fresh cycle.
                let batch = std::mem::take(&mut state.pending);
                state.deadline = None;
                drop(state);

                flush_batch(&inner, batch);

                state = match inner.state.lock() {
                    Ok(state) => state,
                    Err(_) => return,
                };
            }
        }
    }
}

/// Process a swapped-out batch sequentially
fn flush_batch(inner: &Inner, batch: HashMap<(String, String), Vec<u8>>) {
    if batch.is_empty() {
        return;
    }

    let dek = match inner.session.dek() {
        Ok(dek) => dek,
        Err(_) => {
            tracing::warn!(
                dropped = batch.len(),
                "vault locked at flush time, dropping pending writes"
            );
            return;
        }
    };

    for ((store, id), bytes) in batch {
        if let Err(e) = inner.records.put_bytes(&store, &id, &bytes, &dek) {
            tracing::error!(store = %store, id = %id, error = %e, "failed to flush queued write");
        }
    }
}

//! Debounced typeset scheduling worker
//!
//! The host typesets math out-of-band (MathJax or equivalent) after HTML
//! is appended. Typesetting is expensive, so rapid flushes coalesce: each
//! schedule supersedes any older one still waiting out the debounce
//! window, and only the latest generation fires.

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Request to typeset freshly-appended content
#[derive(Debug, Clone)]
pub struct TypesetRequest {
    pub generation: u64,
    pub target: String,
}

/// Typeset scheduler handle
pub struct TypesetScheduler {
    request_tx: Sender<TypesetRequest>,
    next_generation: AtomicU64,
    _worker_thread: thread::JoinHandle<()>,
}

impl TypesetScheduler {
    /// Spawn the worker thread; `on_typeset` runs there once per settled
    /// generation.
    pub fn spawn<F>(debounce: Duration, on_typeset: F) -> Self
    where
        F: FnMut(TypesetRequest) + Send + 'static,
    {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let worker_thread = thread::spawn(move || worker_loop(request_rx, debounce, on_typeset));
        Self {
            request_tx,
            next_generation: AtomicU64::new(1),
            _worker_thread: worker_thread,
        }
    }

    /// Schedule a typeset for `target`. Superseded by any later schedule
    /// arriving within the debounce window. Returns the generation.
    pub fn schedule(&self, target: String) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let _ = self.request_tx.send(TypesetRequest { generation, target });
        generation
    }
}

/// Worker thread main loop
fn worker_loop<F>(request_rx: Receiver<TypesetRequest>, debounce: Duration, mut on_typeset: F)
where
    F: FnMut(TypesetRequest),
{
    let mut latest: Option<TypesetRequest> = None;
    let mut last_update = Instant::now();

    loop {
        match request_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(req) => {
                // Coalesce: newer content supersedes anything still waiting
                latest = Some(req);
                last_update = Instant::now();
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if latest.is_some() && last_update.elapsed() >= debounce {
                    if let Some(req) = latest.take() {
                        on_typeset(req);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // Scheduler dropped; a still-debouncing request is cancelled
                break;
            }
        }
    }
}

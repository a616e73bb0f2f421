//! Per-key coalescing of rapid change notifications.
//!
//! Editors often save a note several times in quick succession. The
//! [`Debouncer`] holds each key until no new notification for it has arrived
//! for the configured quiet period, then emits the key once.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use modified_today::utils::debounce::Debouncer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = mpsc::channel(16);
//!     let debouncer = Debouncer::new(Duration::from_millis(100), tx);
//!
//!     debouncer.touch("Notes/A.md".to_string()).await.unwrap();
//!     debouncer.touch("Notes/A.md".to_string()).await.unwrap();
//!
//!     // Emitted once, 100ms after the last touch.
//!     assert_eq!(rx.recv().await.as_deref(), Some("Notes/A.md"));
//! }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Default quiet period in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Capacity of the input channel.
const INPUT_CAPACITY: usize = 1024;

/// Error type for debouncer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebouncerError {
    /// The background task has stopped.
    #[error("debouncer channel closed")]
    ChannelClosed,
}

/// Requests handled by the background task.
#[derive(Debug)]
enum Message<K> {
    Touch(K),
    Flush(K, oneshot::Sender<bool>),
}

/// Coalesces notifications by key.
///
/// A background task owns the pending deadlines; the handle only forwards
/// keys to it. Dropping the handle flushes every pending key immediately.
#[derive(Debug)]
pub struct Debouncer<K>
where
    K: Clone + Eq + Hash + Send + Debug + 'static,
{
    input_tx: mpsc::Sender<Message<K>>,
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + Send + Debug + 'static,
{
    /// Starts a debouncer that emits keys on `output_tx` after `quiet` has
    /// passed without another notification for the same key.
    #[must_use]
    pub fn new(quiet: Duration, output_tx: mpsc::Sender<K>) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let task = tokio::spawn(run_debounce_loop(quiet, input_rx, output_tx));
        Self { input_tx, task }
    }

    /// Records a notification for `key`, restarting its quiet period.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the background task has
    /// stopped.
    pub async fn touch(&self, key: K) -> Result<(), DebouncerError> {
        self.input_tx
            .send(Message::Touch(key))
            .await
            .map_err(|_| DebouncerError::ChannelClosed)
    }

    /// Drops the pending notification for `key` without emitting it.
    ///
    /// Returns `true` if one was pending. Every key emitted before the call
    /// is already on the output channel when this returns, so the caller can
    /// deliver `key` itself in order.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the background task has
    /// stopped.
    pub async fn flush(&self, key: K) -> Result<bool, DebouncerError> {
        let (reply, pending) = oneshot::channel();
        self.input_tx
            .send(Message::Flush(key, reply))
            .await
            .map_err(|_| DebouncerError::ChannelClosed)?;
        pending.await.map_err(|_| DebouncerError::ChannelClosed)
    }
}

async fn run_debounce_loop<K>(
    quiet: Duration,
    mut input_rx: mpsc::Receiver<Message<K>>,
    output_tx: mpsc::Sender<K>,
) where
    K: Clone + Eq + Hash + Debug,
{
    let mut deadlines: HashMap<K, Instant> = HashMap::new();
    debug!(quiet_ms = quiet.as_millis(), "Starting debounce loop");

    loop {
        let next = deadlines.values().min().copied();

        tokio::select! {
            message = input_rx.recv() => match message {
                Some(Message::Touch(key)) => {
                    trace!(key = ?key, "Deadline reset");
                    deadlines.insert(key, Instant::now() + quiet);
                }
                Some(Message::Flush(key, reply)) => {
                    let pending = deadlines.remove(&key).is_some();
                    trace!(key = ?key, pending, "Flushed key");
                    let _ = reply.send(pending);
                }
                None => {
                    debug!(pending = deadlines.len(), "Input closed, flushing pending keys");
                    let pending: Vec<K> = deadlines.drain().map(|(key, _)| key).collect();
                    for key in pending {
                        emit(&output_tx, key).await;
                    }
                    break;
                }
            },
            () = sleep_until_next(next) => {
                let now = Instant::now();
                let mut due: Vec<(K, Instant)> = deadlines
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(key, deadline)| (key.clone(), *deadline))
                    .collect();
                due.sort_by_key(|(_, deadline)| *deadline);
                for (key, _) in due {
                    deadlines.remove(&key);
                    emit(&output_tx, key).await;
                }
            }
        }
    }

    debug!("Debounce loop terminated");
}

async fn sleep_until_next(next: Option<Instant>) {
    match next {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn emit<K: Debug>(output_tx: &mpsc::Sender<K>, key: K) {
    trace!(key = ?key, "Emitting debounced key");
    if let Err(e) = output_tx.send(key).await {
        warn!(key = ?e.0, "Failed to emit debounced key, receiver dropped");
    }
}

//! File watcher for the vault.
//!
//! Watches the vault directory recursively and emits [`VaultEvent`]s for
//! markdown notes that change, disappear or move.
//!
//! # Architecture
//!
//! The notify callback only classifies raw events and pushes them into an
//! internal channel. A dedicated async task turns them into vault-relative
//! [`VaultEvent`]s; content changes go through a [`Debouncer`] first so a
//! burst of saves produces a single `Changed` event.
//!
//! Files inside the data directory and daily note backups are ignored so the
//! tracker never reacts to its own bookkeeping.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use modified_today::vault::FsVault;
//! use modified_today::watcher::{VaultEvent, VaultWatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vault = FsVault::new("/home/user/notes");
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _watcher = VaultWatcher::new(
//!         vault,
//!         PathBuf::from("/home/user/notes/.modified-today"),
//!         Duration::from_millis(250),
//!         tx,
//!     )?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             VaultEvent::Changed(path) => println!("changed: {path}"),
//!             VaultEvent::Deleted(path) => println!("deleted: {path}"),
//!             VaultEvent::Renamed { from, to } => println!("renamed: {from} -> {to}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{
    event::{ModifyKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::orchestrator::BACKUP_SUFFIX;
use crate::utils::Debouncer;
use crate::vault::FsVault;

/// Capacity of the channel between the notify callback and the async task.
const INTERNAL_CHANNEL_CAPACITY: usize = 1000;

/// Events emitted by the vault watcher. Paths are vault-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// A note was created or its content changed.
    Changed(String),
    /// A note was removed.
    Deleted(String),
    /// A note was moved or renamed.
    Renamed { from: String, to: String },
}

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The vault directory does not exist or is inaccessible.
    #[error("vault directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    /// The event receiver or the debouncer has gone away.
    #[error("vault event channel closed")]
    ChannelClosed,
}

/// Watches a vault and emits [`VaultEvent`]s.
///
/// Dropping the watcher stops the subscription.
#[derive(Debug)]
pub struct VaultWatcher {
    #[allow(dead_code)]
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl VaultWatcher {
    /// Starts watching the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault directory does not exist or the
    /// underlying watcher cannot be created.
    pub fn new(
        vault: FsVault,
        data_dir: PathBuf,
        debounce: Duration,
        events: mpsc::Sender<VaultEvent>,
    ) -> Result<Self, WatcherError> {
        let root = vault.root().to_path_buf();
        if !root.is_dir() {
            return Err(WatcherError::DirectoryNotFound(root));
        }

        let (internal_tx, internal_rx) = mpsc::channel::<VaultEvent>(INTERNAL_CHANNEL_CAPACITY);
        tokio::spawn(process_internal_events(internal_rx, debounce, events));

        let filter = EventFilter { vault, data_dir };
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                handle_notify_event(res, &filter, &internal_tx);
            },
            Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        info!(vault = %root.display(), "Started watching vault");

        Ok(Self { watcher, root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Decides which paths are notes the tracker cares about.
#[derive(Debug, Clone)]
struct EventFilter {
    vault: FsVault,
    data_dir: PathBuf,
}

impl EventFilter {
    /// Returns the vault-relative path of a note, or `None` for paths that
    /// should be ignored.
    fn note_path(&self, path: &Path) -> Option<String> {
        if path.starts_with(&self.data_dir) {
            return None;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            return None;
        }
        let rel = self.vault.relative(path)?;
        if rel.ends_with(BACKUP_SUFFIX) || rel.split('/').any(|part| part.starts_with('.')) {
            return None;
        }
        Some(rel)
    }

    /// Maps a raw notify event to vault events.
    fn classify(&self, event: &Event) -> Vec<VaultEvent> {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let from = self.note_path(&event.paths[0]);
                let to = self.note_path(&event.paths[1]);
                match (from, to) {
                    (Some(from), Some(to)) => vec![VaultEvent::Renamed { from, to }],
                    // Moved out of the watched notes.
                    (Some(from), None) => vec![VaultEvent::Deleted(from)],
                    // Moved in from an ignored location.
                    (None, Some(to)) => vec![VaultEvent::Changed(to)],
                    (None, None) => Vec::new(),
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => event
                .paths
                .iter()
                .filter_map(|p| self.note_path(p))
                .map(VaultEvent::Deleted)
                .collect(),
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
                .paths
                .iter()
                .filter_map(|p| self.note_path(p))
                .map(VaultEvent::Changed)
                .collect(),
            _ => {
                trace!(kind = ?event.kind, "Ignoring event kind");
                Vec::new()
            }
        }
    }
}

/// Handles events from the notify crate.
///
/// Runs on the notify thread, so it never blocks: events that do not fit in
/// the internal channel are dropped with a warning.
fn handle_notify_event(
    res: Result<Event, notify::Error>,
    filter: &EventFilter,
    internal_tx: &mpsc::Sender<VaultEvent>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    for vault_event in filter.classify(&event) {
        if let Err(e) = internal_tx.try_send(vault_event) {
            warn!(error = %e, "Failed to queue vault event, channel may be full");
        }
    }
}

/// Debounces content changes and forwards every event in arrival order.
///
/// A delete or rename first delivers any change still pending for the paths
/// it touches, so the orchestrator never sees a rename before the change
/// that created the file. When the input closes, pending changes are
/// delivered before the task exits.
async fn process_internal_events(
    mut rx: mpsc::Receiver<VaultEvent>,
    debounce: Duration,
    events: mpsc::Sender<VaultEvent>,
) {
    let (changed_tx, mut changed_rx) = mpsc::channel::<String>(INTERNAL_CHANNEL_CAPACITY);
    let debouncer = Debouncer::new(debounce, changed_tx);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let result = match event {
                    VaultEvent::Changed(path) => {
                        if debouncer.touch(path).await.is_err() {
                            error!("Debouncer stopped, dropping change events");
                            break;
                        }
                        continue;
                    }
                    VaultEvent::Deleted(path) => {
                        let event = VaultEvent::Deleted(path.clone());
                        forward_in_order(&debouncer, &mut changed_rx, &events, &[path], event).await
                    }
                    VaultEvent::Renamed { from, to } => {
                        let paths = [from.clone(), to.clone()];
                        let event = VaultEvent::Renamed { from, to };
                        forward_in_order(&debouncer, &mut changed_rx, &events, &paths, event).await
                    }
                };
                if result.is_err() {
                    break;
                }
            }
            Some(path) = changed_rx.recv() => {
                debug!(path = %path, "Forwarding debounced change");
                if events.send(VaultEvent::Changed(path)).await.is_err() {
                    break;
                }
            }
        }
    }

    // Dropping the debouncer flushes its pending keys and closes the channel.
    drop(debouncer);
    while let Some(path) = changed_rx.recv().await {
        debug!(path = %path, "Forwarding pending change on shutdown");
        if events.send(VaultEvent::Changed(path)).await.is_err() {
            break;
        }
    }

    debug!("Vault event processor shutting down");
}

/// Forwards `event` after every change that arrived before it.
async fn forward_in_order(
    debouncer: &Debouncer<String>,
    changed_rx: &mut mpsc::Receiver<String>,
    events: &mpsc::Sender<VaultEvent>,
    paths: &[String],
    event: VaultEvent,
) -> Result<(), WatcherError> {
    let mut flushed = Vec::new();
    for path in paths {
        let flush = debouncer.flush(path.clone());
        tokio::pin!(flush);
        // Keep the output moving so the debouncer can reach the flush.
        let pending = loop {
            tokio::select! {
                result = &mut flush => {
                    break result.map_err(|_| WatcherError::ChannelClosed)?;
                }
                Some(changed) = changed_rx.recv() => {
                    send(events, VaultEvent::Changed(changed)).await?;
                }
            }
        };
        if pending {
            flushed.push(path.clone());
        }
    }

    // Changes that became due before the flush are already queued.
    while let Ok(path) = changed_rx.try_recv() {
        send(events, VaultEvent::Changed(path)).await?;
    }
    for path in flushed {
        send(events, VaultEvent::Changed(path)).await?;
    }

    debug!(event = ?event, "Forwarding vault event");
    send(events, event).await
}

async fn send(events: &mpsc::Sender<VaultEvent>, event: VaultEvent) -> Result<(), WatcherError> {
    events
        .send(event)
        .await
        .map_err(|_| WatcherError::ChannelClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tokio::time::timeout;

    fn filter() -> EventFilter {
        let root = PathBuf::from("/vault");
        EventFilter {
            vault: FsVault::new(&root),
            data_dir: root.join(".modified-today"),
        }
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn notes_are_vault_relative() {
        let f = filter();
        assert_eq!(
            f.note_path(Path::new("/vault/Notes/A.md")),
            Some("Notes/A.md".to_string())
        );
    }

    #[test]
    fn non_notes_are_ignored() {
        let f = filter();
        assert_eq!(f.note_path(Path::new("/vault/image.png")), None);
        assert_eq!(f.note_path(Path::new("/vault/.modified-today/data.json")), None);
        assert_eq!(f.note_path(Path::new("/vault/.obsidian/workspace.md")), None);
        assert_eq!(f.note_path(Path::new("/vault/2024-05-17.md-BACKUP.md")), None);
        assert_eq!(f.note_path(Path::new("/elsewhere/A.md")), None);
    }

    #[test]
    fn classify_create_and_modify_as_changed() {
        let f = filter();
        let created = event(EventKind::Create(CreateKind::File), &["/vault/A.md"]);
        assert_eq!(f.classify(&created), vec![VaultEvent::Changed("A.md".to_string())]);

        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/vault/A.md"],
        );
        assert_eq!(f.classify(&modified), vec![VaultEvent::Changed("A.md".to_string())]);
    }

    #[test]
    fn classify_remove_as_deleted() {
        let f = filter();
        let removed = event(EventKind::Remove(RemoveKind::File), &["/vault/Notes/A.md"]);
        assert_eq!(
            f.classify(&removed),
            vec![VaultEvent::Deleted("Notes/A.md".to_string())]
        );
    }

    #[test]
    fn classify_rename_pair() {
        let f = filter();
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/vault/A.md", "/vault/Notes/B.md"],
        );
        assert_eq!(
            f.classify(&renamed),
            vec![VaultEvent::Renamed {
                from: "A.md".to_string(),
                to: "Notes/B.md".to_string()
            }]
        );
    }

    #[test]
    fn classify_rename_out_of_notes_as_delete() {
        let f = filter();
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/vault/A.md", "/vault/A.txt"],
        );
        assert_eq!(f.classify(&renamed), vec![VaultEvent::Deleted("A.md".to_string())]);
    }

    #[test]
    fn classify_ignores_access_events() {
        let f = filter();
        let accessed = event(EventKind::Access(notify::event::AccessKind::Any), &["/vault/A.md"]);
        assert!(f.classify(&accessed).is_empty());
    }

    fn spawn_processor(
        debounce: Duration,
    ) -> (mpsc::Sender<VaultEvent>, mpsc::Receiver<VaultEvent>) {
        let (internal_tx, internal_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::channel(16);
        tokio::spawn(process_internal_events(internal_rx, debounce, events_tx));
        (internal_tx, events_rx)
    }

    async fn next(rx: &mut mpsc::Receiver<VaultEvent>) -> Option<VaultEvent> {
        timeout(Duration::from_millis(500), rx.recv()).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_changes_are_coalesced() {
        let (internal_tx, mut events_rx) = spawn_processor(Duration::from_millis(30));

        internal_tx.send(VaultEvent::Changed("A.md".to_string())).await.unwrap();
        internal_tx.send(VaultEvent::Changed("A.md".to_string())).await.unwrap();

        assert_eq!(next(&mut events_rx).await, Some(VaultEvent::Changed("A.md".to_string())));

        let extra = timeout(Duration::from_millis(100), events_rx.recv()).await;
        assert!(extra.is_err(), "Duplicate change should be coalesced");
    }

    #[tokio::test]
    async fn change_is_delivered_before_rename_of_same_note() {
        // Long quiet period: the change is still pending when the rename arrives.
        let (internal_tx, mut events_rx) = spawn_processor(Duration::from_secs(30));

        internal_tx
            .send(VaultEvent::Changed("Untitled.md".to_string()))
            .await
            .unwrap();
        internal_tx
            .send(VaultEvent::Renamed {
                from: "Untitled.md".to_string(),
                to: "Idea.md".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            next(&mut events_rx).await,
            Some(VaultEvent::Changed("Untitled.md".to_string()))
        );
        assert_eq!(
            next(&mut events_rx).await,
            Some(VaultEvent::Renamed {
                from: "Untitled.md".to_string(),
                to: "Idea.md".to_string(),
            })
        );

        let extra = timeout(Duration::from_millis(100), events_rx.recv()).await;
        assert!(extra.is_err(), "Flushed change must not be emitted again");
    }

    #[tokio::test]
    async fn change_is_delivered_before_delete_and_unrelated_change_waits() {
        let (internal_tx, mut events_rx) = spawn_processor(Duration::from_millis(200));

        internal_tx.send(VaultEvent::Changed("A.md".to_string())).await.unwrap();
        internal_tx.send(VaultEvent::Changed("B.md".to_string())).await.unwrap();
        internal_tx.send(VaultEvent::Deleted("A.md".to_string())).await.unwrap();

        assert_eq!(next(&mut events_rx).await, Some(VaultEvent::Changed("A.md".to_string())));
        assert_eq!(next(&mut events_rx).await, Some(VaultEvent::Deleted("A.md".to_string())));
        assert_eq!(next(&mut events_rx).await, Some(VaultEvent::Changed("B.md".to_string())));
    }

    #[tokio::test]
    async fn pending_change_is_delivered_when_input_closes() {
        let (internal_tx, mut events_rx) = spawn_processor(Duration::from_secs(30));

        internal_tx.send(VaultEvent::Changed("A.md".to_string())).await.unwrap();
        drop(internal_tx);

        assert_eq!(next(&mut events_rx).await, Some(VaultEvent::Changed("A.md".to_string())));
        assert_eq!(next(&mut events_rx).await, None);
    }

    #[tokio::test]
    async fn watcher_requires_existing_directory() {
        let (tx, _rx) = mpsc::channel(10);
        let result = VaultWatcher::new(
            FsVault::new("/nonexistent/vault"),
            PathBuf::from("/nonexistent/vault/.modified-today"),
            Duration::from_millis(10),
            tx,
        );
        assert!(matches!(result, Err(WatcherError::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn watcher_starts_on_existing_directory() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (tx, _rx) = mpsc::channel(10);
        let watcher = VaultWatcher::new(
            FsVault::new(dir.path()),
            dir.path().join(".modified-today"),
            Duration::from_millis(10),
            tx,
        )
        .expect("Should create watcher");
        assert_eq!(watcher.root(), dir.path());
    }

    #[test]
    fn watcher_error_display() {
        let err = WatcherError::DirectoryNotFound(PathBuf::from("/vault"));
        assert_eq!(err.to_string(), "vault directory does not exist: /vault");
    }
}

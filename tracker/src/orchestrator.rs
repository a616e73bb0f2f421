//! Serialized orchestration of tracking, rendering and persistence.
//!
//! [`Orchestrator`] owns the settings and is the only code that mutates them.
//! Its four entry points ([`Orchestrator::on_cache_change`],
//! [`Orchestrator::on_vault_delete`], [`Orchestrator::on_vault_rename`] and
//! [`Orchestrator::update_tracked_files`]) each run to completion, including
//! the settings save and the daily note write, before the next one starts.
//!
//! In a running process the orchestrator lives inside a single worker task
//! (see [`Orchestrator::spawn`]). Producers talk to it through a cloneable
//! [`OrchestratorHandle`], which queues [`Command`]s on a bounded channel;
//! commands are processed strictly in arrival order.
//!
//! # Write cadence
//!
//! With a positive `writeInterval` of N seconds the worker renders every N
//! seconds. With `0`, periodic writes are disabled and every membership
//! change renders immediately. An invalid value falls back to the default
//! interval and is reported once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TrackerError};
use crate::filter::Candidate;
use crate::format::{base_name, render_entry, Placeholder, Template};
use crate::notice::{Clock, Notifier, SystemClock, TracingNotifier};
use crate::persistence::SettingsStore;
use crate::settings::{Settings, DEFAULT_WRITE_INTERVAL_SECS};
use crate::splice::splice_text;
use crate::tracking::{self, Membership};
use crate::vault::{Vault, VaultError};
use crate::watcher::VaultEvent;

/// Suffix appended to the daily note path for its one-time backup.
pub const BACKUP_SUFFIX: &str = "-BACKUP.md";

/// Work items processed by the orchestrator worker.
#[derive(Debug)]
pub enum Command {
    /// A note's content changed.
    CacheChanged(String),
    /// A note was deleted.
    Deleted(String),
    /// A note was renamed.
    Renamed { from: String, to: String },
    /// Re-render the daily note.
    Render,
    /// Reply with a snapshot of the current settings.
    Status(oneshot::Sender<Settings>),
}

impl From<VaultEvent> for Command {
    fn from(event: VaultEvent) -> Self {
        match event {
            VaultEvent::Changed(path) => Self::CacheChanged(path),
            VaultEvent::Deleted(path) => Self::Deleted(path),
            VaultEvent::Renamed { from, to } => Self::Renamed { from, to },
        }
    }
}

/// What a render did to the daily note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The managed region was rewritten.
    Written {
        path: String,
        entries: usize,
        skipped: usize,
    },
    /// The rendered content matched the note, nothing was written.
    Unchanged { path: String },
    /// The note was left alone; the reason was shown as a notice.
    Skipped { reason: String },
}

/// Owns the settings and sequences every tracker operation.
pub struct Orchestrator {
    settings: Settings,
    store: SettingsStore,
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    interval_warned: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator that logs notices and uses the local date.
    #[must_use]
    pub fn new(settings: Settings, store: SettingsStore, vault: Arc<dyn Vault>) -> Self {
        Self {
            settings,
            store,
            vault,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            interval_warned: false,
        }
    }

    /// Loads settings from `store` and creates an orchestrator around them.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored settings cannot be read or parsed.
    pub fn load(store: SettingsStore, vault: Arc<dyn Vault>) -> Result<Self> {
        let settings = store.load()?;
        Ok(Self::new(settings, store, vault))
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Evaluates a changed note against the filters and updates the tracked
    /// set.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be saved, or if an immediate
    /// render fails.
    pub async fn on_cache_change(&mut self, path: &str) -> Result<Membership> {
        let today = self.clock.today();
        let rolled_over = tracking::roll_over(&mut self.settings, today);

        let membership = if self.vault.exists(path) {
            let tags = self
                .vault
                .metadata(path)
                .map(|meta| meta.tags)
                .unwrap_or_default();
            let candidate = Candidate {
                path,
                tags: &tags,
                title: base_name(path),
                is_daily_note: path == self.vault.daily_note_path(today),
            };
            tracking::on_file_changed(&mut self.settings, &candidate, today)
        } else {
            debug!(path = %path, "Changed file no longer exists, ignoring");
            Membership::Unchanged
        };

        if rolled_over || membership.changed() {
            self.persist().await?;
            if self.renders_immediately() {
                self.update_tracked_files().await?;
            }
        }
        Ok(membership)
    }

    /// Drops a deleted note from the tracked set.
    ///
    /// Returns `true` if the note was tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be saved, or if an immediate
    /// render fails.
    pub async fn on_vault_delete(&mut self, path: &str) -> Result<bool> {
        let today = self.clock.today();
        let rolled_over = tracking::roll_over(&mut self.settings, today);
        let removed = tracking::on_file_deleted(&mut self.settings, path, today);

        if rolled_over || removed {
            self.persist().await?;
            if self.renders_immediately() {
                self.update_tracked_files().await?;
            }
        }
        Ok(removed)
    }

    /// Moves a renamed note to its new path in the tracked set.
    ///
    /// Entries rendered without a link still show the old name, so a
    /// template without `[[link]]` is re-rendered right away.
    ///
    /// Returns `true` if the old path was tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be saved or the re-render
    /// fails.
    pub async fn on_vault_rename(&mut self, old_path: &str, new_path: &str) -> Result<bool> {
        let today = self.clock.today();
        let rolled_over = tracking::roll_over(&mut self.settings, today);
        let renamed = tracking::on_file_renamed(&mut self.settings, old_path, new_path, today);

        if rolled_over || renamed {
            self.persist().await?;
        }
        if renamed {
            let uses_link = Template::parse(&self.settings.output_format).uses(Placeholder::Link);
            if !uses_link || self.renders_immediately() {
                self.update_tracked_files().await?;
            }
        }
        Ok(renamed)
    }

    /// Rewrites the managed region of today's daily note.
    ///
    /// Missing daily notes and missing headings are reported as notices and
    /// yield [`RenderOutcome::Skipped`]; the note is never modified on those
    /// paths.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, writing or backing up the note fails, or
    /// if the settings cannot be saved.
    pub async fn update_tracked_files(&mut self) -> Result<RenderOutcome> {
        let today = self.clock.today();
        if tracking::roll_over(&mut self.settings, today) {
            self.persist().await?;
        }

        let note = match self.resolve_daily_note(today)? {
            Some(note) => note,
            None => {
                let reason = format!(
                    "Daily note {} does not exist; enable automatic creation or create it",
                    self.vault.daily_note_path(today)
                );
                return Ok(self.skip(reason));
            }
        };

        if !self.settings.has_been_backed_up {
            let backup = format!("{note}{BACKUP_SUFFIX}");
            self.vault
                .copy(&note, &backup)
                .map_err(|e| self.surface(e))?;
            info!(note = %note, backup = %backup, "Backed up daily note");
            self.settings.has_been_backed_up = true;
            self.persist().await?;
        }

        let text = self.vault.read(&note).map_err(|e| self.surface(e))?;
        let headings = self.vault.metadata(&note).map(|meta| meta.headings);

        let template = Template::parse(&self.settings.output_format);
        let mut entries = Vec::with_capacity(self.settings.tracked_files.len());
        let mut skipped = 0;
        for path in self.settings.tracked_files.iter() {
            match render_entry(self.vault.as_ref(), path, &note, &template) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping stale tracked file");
                    skipped += 1;
                }
            }
        }

        let spliced = splice_text(
            &text,
            headings.as_deref(),
            &self.settings.heading,
            &entries,
        );
        let updated = match spliced {
            Ok(updated) => updated,
            Err(e) => return Ok(self.skip(format!("Cannot update {note}: {e}"))),
        };

        if updated == text {
            debug!(note = %note, "Daily note already up to date");
            return Ok(RenderOutcome::Unchanged { path: note });
        }

        self.vault
            .write(&note, &updated)
            .map_err(|e| self.surface(e))?;
        info!(
            note = %note,
            entries = entries.len(),
            skipped,
            "Updated daily note"
        );
        Ok(RenderOutcome::Written {
            path: note,
            entries: entries.len(),
            skipped,
        })
    }

    /// Returns the periodic render interval, or `None` when every change
    /// renders immediately.
    pub fn write_interval(&mut self) -> Option<Duration> {
        match self.settings.write_interval() {
            Ok(interval) => interval,
            Err(e) => {
                if !self.interval_warned {
                    self.notifier.notice(&format!(
                        "{e}; using the default of {DEFAULT_WRITE_INTERVAL_SECS} seconds"
                    ));
                    self.interval_warned = true;
                }
                Some(Duration::from_secs(DEFAULT_WRITE_INTERVAL_SECS))
            }
        }
    }

    /// Applies one command.
    pub async fn handle(&mut self, command: Command) {
        let result = match command {
            Command::CacheChanged(path) => self.on_cache_change(&path).await.map(drop),
            Command::Deleted(path) => self.on_vault_delete(&path).await.map(drop),
            Command::Renamed { from, to } => self.on_vault_rename(&from, &to).await.map(drop),
            Command::Render => self.update_tracked_files().await.map(drop),
            Command::Status(reply) => {
                if reply.send(self.settings.clone()).is_err() {
                    debug!("Status requester went away");
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(error = %e, "Command failed");
        }
    }

    /// Moves the orchestrator into a worker task.
    ///
    /// The worker exits once every handle is dropped, after processing the
    /// commands still queued and performing a final render.
    #[must_use]
    pub fn spawn(self, capacity: usize) -> (OrchestratorHandle, JoinHandle<Settings>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(self.run(rx));
        (OrchestratorHandle { tx }, worker)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) -> Settings {
        let mut ticker = self.write_interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(
            interval_secs = ticker.as_ref().map(|t| t.period().as_secs()),
            tracked = self.settings.tracked_files.len(),
            "Orchestrator started"
        );

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                () = next_tick(&mut ticker) => self.handle(Command::Render).await,
            }
        }

        debug!("Command queue closed, performing final render");
        self.handle(Command::Render).await;
        info!("Orchestrator stopped");
        self.settings
    }

    fn renders_immediately(&mut self) -> bool {
        self.write_interval().is_none()
    }

    /// Returns today's daily note, creating it when allowed.
    ///
    /// `Ok(None)` means the note does not exist and may not be created.
    fn resolve_daily_note(&self, today: chrono::NaiveDate) -> Result<Option<String>> {
        match self.vault.resolve_daily_note(today) {
            Ok(note) => Ok(Some(note)),
            Err(VaultError::DailyNoteNotFound(_)) if self.settings.automatically_create_daily_note => {
                self.vault
                    .create_daily_note(today)
                    .map(Some)
                    .map_err(|e| self.surface(e))
            }
            Err(VaultError::DailyNoteNotFound(_)) => Ok(None),
            Err(e) => Err(self.surface(e)),
        }
    }

    async fn persist(&self) -> Result<()> {
        self.store
            .save(&self.settings)
            .await
            .map_err(|e| self.surface(e))
    }

    fn skip(&self, reason: String) -> RenderOutcome {
        self.notifier.notice(&reason);
        RenderOutcome::Skipped { reason }
    }

    /// Shows `err` as a notice and converts it for propagation.
    fn surface(&self, err: impl Into<TrackerError>) -> TrackerError {
        let err = err.into();
        self.notifier.notice(&err.to_string());
        err
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Producer side of the orchestrator's command queue.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Command>,
}

impl OrchestratorHandle {
    /// Queues a command, waiting for room in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::OrchestratorStopped`] if the worker is gone.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| TrackerError::OrchestratorStopped)
    }

    /// Queues the command matching a vault event.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::OrchestratorStopped`] if the worker is gone.
    pub async fn dispatch(&self, event: VaultEvent) -> Result<()> {
        self.send(event.into()).await
    }

    /// Queues a render of the daily note.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::OrchestratorStopped`] if the worker is gone.
    pub async fn render(&self) -> Result<()> {
        self.send(Command::Render).await
    }

    /// Returns a snapshot of the settings once every earlier command has
    /// been processed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::OrchestratorStopped`] if the worker is gone.
    pub async fn status(&self) -> Result<Settings> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status(reply)).await?;
        response.await.map_err(|_| TrackerError::OrchestratorStopped)
    }

    /// Queues every event left in `events` until its senders are gone.
    ///
    /// Returns the number of events queued.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::OrchestratorStopped`] if the worker is gone.
    pub async fn forward_remaining(
        &self,
        events: &mut mpsc::Receiver<VaultEvent>,
    ) -> Result<usize> {
        let mut forwarded = 0;
        while let Some(event) = events.recv().await {
            self.dispatch(event).await?;
            forwarded += 1;
        }
        Ok(forwarded)
    }
}

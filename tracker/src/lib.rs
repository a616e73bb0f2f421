//! Modified Today - a running list of notes modified today, kept in the daily note.
//!
//! This crate watches a vault of markdown notes, maintains the ordered set of
//! notes that were modified "today", and rewrites the section under a
//! configured heading of today's daily note with one rendered entry per
//! tracked note.
//!
//! # Overview
//!
//! A change, delete or rename notification enters the [`tracking`] functions,
//! which consult the [`filter`] predicates to decide membership. The
//! [`orchestrator`] then renders each tracked path through the [`format`]
//! template and hands the entries to the [`splice`] module, which replaces
//! only the managed region of the daily note.
//!
//! # Modules
//!
//! - [`settings`]: Persisted settings record with merge-with-defaults loading
//! - [`persistence`]: JSON settings store with retried saves
//! - [`filter`]: Tag, folder and title predicates deciding trackability
//! - [`tracked`]: Ordered set of tracked file paths
//! - [`tracking`]: Membership updates, daily rollover, delete and rename handling
//! - [`format`]: Output template parsing and placeholder substitution
//! - [`splice`]: Managed region lookup and replacement in the daily note
//! - [`metadata`]: Tag and heading extraction from markdown text
//! - [`vault`]: Vault abstraction and its filesystem implementation
//! - [`notice`]: User-facing notices and the date source
//! - [`orchestrator`]: Serialized command worker that sequences everything
//! - [`watcher`]: File system watcher producing vault events
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Crate-wide error type
//! - [`utils`]: Shared utilities (debouncing)

pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod metadata;
pub mod notice;
pub mod orchestrator;
pub mod persistence;
pub mod settings;
pub mod splice;
pub mod tracked;
pub mod tracking;
pub mod utils;
pub mod vault;
pub mod watcher;

pub use config::Config;
pub use error::{Result, TrackerError};
pub use filter::Filters;
pub use format::{Placeholder, Template};
pub use metadata::{parse_metadata, FileMetadata, Heading};
pub use notice::{Clock, FixedClock, Notifier, RecordingNotifier, SystemClock, TracingNotifier};
pub use orchestrator::{Command, Orchestrator, OrchestratorHandle, RenderOutcome};
pub use persistence::SettingsStore;
pub use settings::{Settings, SettingsError};
pub use splice::{splice_managed_region, SpliceError};
pub use tracked::TrackedSet;
pub use tracking::Membership;
pub use utils::{Debouncer, DEFAULT_DEBOUNCE_MS};
pub use vault::{FsVault, Vault, VaultError};
pub use watcher::{VaultEvent, VaultWatcher, WatcherError};

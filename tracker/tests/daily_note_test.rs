//! End-to-end tests for tracking notes and rendering the daily note.
//!
//! These tests drive the orchestrator against a real vault directory and a
//! real settings file, checking the document and the stored settings after
//! each step.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use modified_today::orchestrator::{Orchestrator, RenderOutcome};
use modified_today::persistence::SettingsStore;
use modified_today::vault::FsVault;
use modified_today::{FixedClock, Membership, RecordingNotifier, Settings, VaultEvent};

// ============================================================================
// Helper Functions
// ============================================================================

const DAILY: &str = "Journal/17-05-2024.md";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
}

/// Writes a note, creating parent folders.
fn write_note(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).expect("Failed to create note folder");
    fs::write(path, content).expect("Failed to write note");
}

fn read_note(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).expect("Failed to read note")
}

/// Writes `data.json` with the given settings.
fn seed_settings(store: &SettingsStore, settings: &Settings) {
    fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    fs::write(store.path(), serde_json::to_string(settings).unwrap()).unwrap();
}

struct Harness {
    dir: TempDir,
    store: SettingsStore,
    clock: Arc<FixedClock>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = SettingsStore::new(&dir.path().join(".modified-today"))
            .with_retry(1, Duration::from_millis(1));
        Self {
            dir,
            store,
            clock: Arc::new(FixedClock::new(today())),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Loads an orchestrator from the stored settings, the way the binary does.
    fn orchestrator(&self) -> Orchestrator {
        let vault = FsVault::new(self.root()).with_daily_notes("Journal", "%d-%m-%Y");
        Orchestrator::load(self.store.clone(), Arc::new(vault))
            .expect("Failed to load orchestrator")
            .with_clock(self.clock.clone())
            .with_notifier(self.notifier.clone())
    }
}

fn base_settings() -> Settings {
    Settings {
        heading: "Modified".to_string(),
        output_format: "- [[link]] [[tags]]".to_string(),
        tags: "#daily, #private".to_string(),
        excluded_folders: "/Archive/, Templates".to_string(),
        ignored_name_contains: "draft".to_string(),
        ..Settings::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_filters_decide_what_is_listed() {
    let h = Harness::new();
    seed_settings(&h.store, &base_settings());
    write_note(h.root(), DAILY, "# Log\nwoke up\n# Modified\n# Tasks\n- [ ] write\n");
    write_note(h.root(), "Projects/Plan.md", "#work plans\n");
    write_note(h.root(), "Archive/Sub/x.md", "old\n");
    write_note(h.root(), "Templates/Day.md", "template\n");
    write_note(h.root(), "Notes/Draft idea.md", "wip\n");
    write_note(h.root(), "Notes/Secret.md", "---\ntags: [private]\n---\n");
    write_note(h.root(), "Notes/My Note.md", "plain\n");

    let mut orch = h.orchestrator();
    for path in [
        "Projects/Plan.md",
        "Archive/Sub/x.md",
        "Templates/Day.md",
        "Notes/Draft idea.md",
        "Notes/Secret.md",
        "Notes/My Note.md",
        DAILY,
    ] {
        orch.on_cache_change(path).await.unwrap();
    }

    let tracked: Vec<&str> = orch.settings().tracked_files.iter().collect();
    assert_eq!(tracked, vec!["Projects/Plan.md", "Notes/My Note.md"]);

    let outcome = orch.update_tracked_files().await.unwrap();
    assert!(matches!(outcome, RenderOutcome::Written { entries: 2, .. }));
    assert_eq!(
        read_note(h.root(), DAILY),
        "# Log\nwoke up\n# Modified\n\
         - [Plan](../Projects/Plan.md) \\#work\n\
         - [My Note](../Notes/My%20Note.md) \n\
         # Tasks\n- [ ] write\n"
    );
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = Harness::new();
    seed_settings(&h.store, &base_settings());
    write_note(h.root(), "A.md", "a\n");
    write_note(h.root(), "B.md", "b\n");

    {
        let mut orch = h.orchestrator();
        orch.on_cache_change("A.md").await.unwrap();
        orch.on_cache_change("B.md").await.unwrap();
    }

    let mut orch = h.orchestrator();
    let tracked: Vec<&str> = orch.settings().tracked_files.iter().collect();
    assert_eq!(tracked, vec!["A.md", "B.md"]);

    // Evaluating again does not duplicate.
    assert_eq!(
        orch.on_cache_change("A.md").await.unwrap(),
        Membership::Unchanged
    );
    assert_eq!(orch.settings().tracked_files.len(), 2);

    let stored = h.store.load().unwrap();
    assert_eq!(stored.last_tracked_date, "2024-05-17");
    assert_eq!(stored.heading, "Modified");
}

#[tokio::test]
async fn test_next_day_starts_a_fresh_list() {
    let h = Harness::new();
    seed_settings(&h.store, &base_settings());
    write_note(h.root(), "A.md", "a\n");
    write_note(h.root(), "B.md", "b\n");
    write_note(h.root(), "Journal/18-05-2024.md", "# Modified\n- stale\n");

    let mut orch = h.orchestrator();
    orch.on_cache_change("A.md").await.unwrap();

    h.clock.set(today().succ_opt().unwrap());
    orch.on_cache_change("B.md").await.unwrap();

    let tracked: Vec<&str> = orch.settings().tracked_files.iter().collect();
    assert_eq!(tracked, vec!["B.md"]);

    orch.update_tracked_files().await.unwrap();
    assert_eq!(
        read_note(h.root(), "Journal/18-05-2024.md"),
        "# Modified\n- [B](../B.md) \n"
    );
}

#[tokio::test]
async fn test_render_after_rollover_clears_region() {
    let h = Harness::new();
    let mut settings = base_settings();
    settings.last_tracked_date = "2024-05-16".to_string();
    settings.tracked_files.insert("A.md");
    seed_settings(&h.store, &settings);
    write_note(h.root(), "A.md", "a\n");
    write_note(h.root(), DAILY, "# Modified\n- [A](../A.md) \n## Later\n");

    let mut orch = h.orchestrator();
    orch.update_tracked_files().await.unwrap();

    assert_eq!(read_note(h.root(), DAILY), "# Modified\n## Later\n");
    assert!(h.store.load().unwrap().tracked_files.is_empty());
}

#[tokio::test]
async fn test_auto_created_note_and_backup() {
    let h = Harness::new();
    seed_settings(
        &h.store,
        &Settings {
            automatically_create_daily_note: true,
            ..base_settings()
        },
    );

    let mut orch = h.orchestrator();
    let outcome = orch.update_tracked_files().await.unwrap();

    assert!(matches!(outcome, RenderOutcome::Skipped { .. }));
    assert!(h.root().join(DAILY).exists());
    assert!(h.root().join(format!("{DAILY}-BACKUP.md")).exists());
    assert!(h.store.load().unwrap().has_been_backed_up);
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_worker_applies_vault_events() {
    let h = Harness::new();
    seed_settings(
        &h.store,
        &Settings {
            output_format: "- [[name]]".to_string(),
            ..base_settings()
        },
    );
    write_note(h.root(), DAILY, "# Modified\n");
    write_note(h.root(), "A.md", "a\n");
    write_note(h.root(), "B.md", "b\n");

    let (handle, worker) = h.orchestrator().spawn(4);

    handle
        .dispatch(VaultEvent::Changed("A.md".to_string()))
        .await
        .unwrap();
    handle
        .dispatch(VaultEvent::Changed("B.md".to_string()))
        .await
        .unwrap();
    write_note(h.root(), "C.md", "a\n");
    handle
        .dispatch(VaultEvent::Renamed {
            from: "A.md".to_string(),
            to: "C.md".to_string(),
        })
        .await
        .unwrap();

    // A name-only template is re-rendered on rename.
    let status = handle.status().await.unwrap();
    let tracked: Vec<&str> = status.tracked_files.iter().collect();
    assert_eq!(tracked, vec!["B.md", "C.md"]);
    assert_eq!(read_note(h.root(), DAILY), "# Modified\n- B\n- C\n");

    handle
        .dispatch(VaultEvent::Deleted("B.md".to_string()))
        .await
        .unwrap();
    drop(handle);

    let settings = worker.await.unwrap();
    assert_eq!(settings.tracked_files.len(), 1);
    assert_eq!(read_note(h.root(), DAILY), "# Modified\n- C\n");
}

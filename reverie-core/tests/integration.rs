//! Integration tests: whole turns through the assembler, and snapshot
//! save/load through both stores.

use reverie_core::config::{PersistenceConfig, ReverieConfig};
use reverie_core::context::{ActionExtraction, ContextAssembler};
use reverie_core::emotion::{Attitude, RelationshipLabel};
use reverie_core::memory::dynamic::DEFAULT_LOCATION;
use reverie_core::persistence::{self, JsonSnapshotFile, SnapshotStore, SqliteSnapshotStore};
use reverie_core::{LocationKind, ReverieError};

fn assembler() -> ContextAssembler {
    ContextAssembler::new(&ReverieConfig::default())
}

fn turn(a: &mut ContextAssembler, input: &str, reply: &str) -> reverie_core::FusedContext {
    let ctx = a.construct_context(input);
    a.manage_dynamic_memory(input, reply);
    ctx
}

// ---------------------------------------------------------------------------
// Conversation flows
// ---------------------------------------------------------------------------

#[test]
fn long_project_conversation_reaches_long_term_memory() {
    let mut a = assembler();
    for i in 0..40 {
        turn(
            &mut a,
            &format!("Let's work on the project, part {i}"),
            "*sighs* 'Fine, but we do it my way.'",
        );
        assert!(a.cascade().dynamic.len() <= a.cascade().dynamic.max_events());
        assert!(a.cascade().active.len() < a.cascade().active.threshold());
        assert!(a.core().check_invariants().is_ok());
    }

    assert!(!a.cascade().long_term.is_empty());
    assert_eq!(a.cascade().long_term.len() % 3, 0);
    assert_eq!(a.cascade().dynamic.current_action(), "Working on the project");
    assert_eq!(a.user().history().len(), 40);

    let ctx = a.construct_context("What now?");
    assert!(ctx.active_memory.len() <= 10);
    assert_eq!(ctx.user_memories.len(), 3);
    assert_eq!(ctx.previous_action.as_deref(), Some("*sighs*"));
}

#[test]
fn sustained_hostility_reads_as_hostile() {
    let mut a = assembler();
    let mut last = None;
    for _ in 0..15 {
        let ctx = turn(
            &mut a,
            "Whatever, you're stupid and this is your problem",
            "*glares*",
        );
        last = Some(ctx.guidance);
    }
    let guidance = last.expect("at least one turn");
    assert_eq!(guidance.relationship, RelationshipLabel::Hostile);
    assert_ne!(guidance.attitude, Attitude::Warm);
}

#[test]
fn visiting_the_private_location_changes_flags() {
    let mut a = assembler();
    let ctx = turn(&mut a, "Want to work at your house?", "*shrugs*");
    assert_eq!(ctx.location, "Poppy's House");
    assert_eq!(ctx.flags.location, LocationKind::Private);
    assert_eq!(ctx.action, "Working on the project");
}

#[test]
fn reply_without_asterisks_records_placeholder() {
    let mut a = assembler();
    a.construct_context("Hi");
    let extraction = a.manage_dynamic_memory("Hi", "Hello there.");
    assert_eq!(extraction, ActionExtraction::Unparseable);
    assert_eq!(
        a.cascade().dynamic.last_narrative_action(),
        Some("*[Action could not be parsed]*")
    );
}

#[test]
fn seeded_scene_shows_up_in_first_context() {
    let mut a = assembler();
    a.seed_scene(
        "School Library",
        "waiting to discuss the project",
        "Lin skipped the project meeting.",
    );
    let ctx = a.construct_context("Hey");
    assert_eq!(ctx.location, "School Library");
    assert_eq!(ctx.action, "waiting to discuss the project");
    assert!(ctx
        .dynamic_memory
        .iter()
        .any(|m| m == "Lin skipped the project meeting."));
}

// ---------------------------------------------------------------------------
// Persistence round-trips
// ---------------------------------------------------------------------------

fn played_session() -> ContextAssembler {
    let mut a = assembler();
    turn(&mut a, "Let's go to the library", "*picks up her bag*");
    turn(&mut a, "I'm sorry, I trust you, let's do this together", "*pauses* 'Okay.'");
    turn(&mut a, "We should plan the project", "*opens her notebook*");
    a
}

#[test]
fn json_file_round_trip_restores_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonSnapshotFile::new(dir.path().join("save_state.json"));
    assert!(store.load().expect("load empty").is_none());

    let original = played_session();
    let snapshot = original.snapshot();
    store.save(&snapshot).expect("save");
    let loaded = store.load().expect("load").expect("present");
    assert_eq!(loaded.dynamic_memories, snapshot.dynamic_memories);
    assert_eq!(loaded.roleplay_time, snapshot.roleplay_time);

    let mut restored = assembler();
    assert!(restored.restore_or_default(&store));
    assert_eq!(restored.core().internal(), original.core().internal());
    assert_eq!(restored.core().relationship(), original.core().relationship());
    assert_eq!(restored.cascade().dynamic.location(), "Library");
    assert_eq!(restored.cascade().dynamic.current_action(), "Planning the project");
    assert_eq!(restored.user().history(), original.user().history());
    assert_eq!(restored.clock().now(), original.clock().now());
}

#[test]
fn sqlite_round_trip_restores_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = PersistenceConfig {
        backend: "sqlite".into(),
        ..PersistenceConfig::default()
    };
    let store = SqliteSnapshotStore::open(dir.path().join("reverie.db"), &config).expect("open");

    let original = played_session();
    store.save(&original.snapshot()).expect("save");
    // Saving twice overwrites the slot.
    store.save(&original.snapshot()).expect("save again");

    let mut restored = assembler();
    assert!(restored.restore_or_default(&store));
    assert_eq!(
        restored.core().emotional_memories(),
        original.core().emotional_memories()
    );
    assert_eq!(
        restored.cascade().active.memories(),
        original.cascade().active.memories()
    );
    assert!(store.integrity_check().expect("integrity"));
}

#[test]
fn corrupt_json_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("save_state.json");
    std::fs::write(&path, b"{ this is not json").expect("write");
    let store = JsonSnapshotFile::new(&path);

    assert!(matches!(
        store.load(),
        Err(ReverieError::CorruptSnapshot { .. })
    ));

    let mut a = assembler();
    assert!(!a.restore_or_default(&store));
    assert_eq!(a.cascade().dynamic.location(), DEFAULT_LOCATION);
    assert!(a.cascade().dynamic.is_empty());
}

#[test]
fn out_of_range_state_is_rejected_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("save_state.json");

    let snapshot = played_session().snapshot();
    let mut value = serde_json::to_value(&snapshot).expect("to value");
    value["emotional_core"]["internal"]["vulnerability"] = serde_json::json!(3.0);
    std::fs::write(&path, serde_json::to_vec(&value).expect("encode")).expect("write");

    let store = JsonSnapshotFile::new(&path);
    assert!(matches!(
        store.load(),
        Err(ReverieError::CorruptSnapshot { .. })
    ));
}

#[test]
fn snapshot_at_end_of_time_is_discarded_and_turns_continue() {
    let mut snapshot = played_session().snapshot();
    snapshot.roleplay_time = chrono::NaiveDateTime::MAX;

    let mut a = assembler();
    let before = a.clock().now();
    assert!(matches!(
        a.restore(snapshot),
        Err(ReverieError::CorruptSnapshot { .. })
    ));
    assert_eq!(a.clock().now(), before);

    turn(&mut a, "Hi", "*waves*");
    assert!(a.clock().now() > before);
}

#[test]
fn oversized_time_scale_is_rejected_by_validation() {
    let mut config = ReverieConfig::default();
    config.context.time_scale_factor = 1e15;
    assert!(matches!(config.validate(), Err(ReverieError::Config(_))));
}

#[test]
fn open_store_follows_backend_setting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let none = PersistenceConfig {
        backend: "none".into(),
        ..PersistenceConfig::default()
    };
    assert!(persistence::open_store(&none).expect("none").is_none());

    let json = PersistenceConfig {
        path: dir.path().join("s.json").to_string_lossy().into_owned(),
        ..PersistenceConfig::default()
    };
    assert!(persistence::open_store(&json).expect("json").is_some());

    let bogus = PersistenceConfig {
        backend: "redis".into(),
        ..PersistenceConfig::default()
    };
    assert!(matches!(
        persistence::open_store(&bogus),
        Err(ReverieError::Config(_))
    ));
}

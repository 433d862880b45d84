//! Whole-session tests against a scripted model.

use std::time::Duration;

use reverie_core::config::PersistenceConfig;
use reverie_core::context::ActionExtraction;
use reverie_core::{ReverieConfig, ReverieError};
use reverie_llm::{LlmError, ScriptedBackend};
use reverie_rp::{ReplySource, Session};

fn config_in(dir: &tempfile::TempDir, backend: &str) -> ReverieConfig {
    let file = if backend == "sqlite" { "reverie.db" } else { "save_state.json" };
    ReverieConfig {
        persistence: PersistenceConfig {
            backend: backend.into(),
            path: dir.path().join(file).to_string_lossy().into_owned(),
            ..PersistenceConfig::default()
        },
        ..ReverieConfig::default()
    }
}

fn memoryless() -> ReverieConfig {
    ReverieConfig {
        persistence: PersistenceConfig {
            backend: "none".into(),
            ..PersistenceConfig::default()
        },
        ..ReverieConfig::default()
    }
}

#[tokio::test]
async fn turn_feeds_reply_back_into_memory() {
    let backend = ScriptedBackend::new().with_reply("*closes her laptop* 'You're late.'");
    let mut session = Session::open(&memoryless(), backend).expect("open");
    session.seed_opening(
        "School Library",
        "waiting to discuss the project",
        "Lin missed yesterday's meeting.",
    );

    let outcome = session.take_turn("Sorry, I overslept.").await;
    assert_eq!(outcome.reply.source, ReplySource::Model);
    assert_eq!(outcome.reply.dialogue, "You're late.");
    assert_eq!(
        outcome.extraction,
        ActionExtraction::Delimited("*closes her laptop*".into())
    );

    let a = session.assembler();
    assert_eq!(a.user().history(), ["Poppy said: '*closes her laptop* 'You're late.''"]);
    assert_eq!(
        a.cascade().dynamic.last_narrative_action(),
        Some("*closes her laptop*")
    );
    assert!(a
        .cascade()
        .dynamic
        .memories()
        .any(|m| m.starts_with("Lin said: 'Sorry, I overslept.'. Poppy responded:")));
    assert!(!session.restored());
    assert!(!session.save().expect("save without store"));
}

#[tokio::test]
async fn previous_action_reaches_the_next_prompt() {
    let backend = ScriptedBackend::new()
        .with_reply("*drums her fingers on the table* 'Well?'")
        .with_reply("*sighs* 'Fine.'");
    let mut session = Session::open(&memoryless(), backend).expect("open");

    session.take_turn("Hey Poppy").await;
    session.take_turn("Can we start?").await;

    let requests = session.generator().backend().requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].user.contains("*drums her fingers on the table*"));
    assert!(requests[1].user.contains("Lin just said: 'Can we start?'"));
}

#[tokio::test]
async fn model_failure_still_completes_the_turn() {
    let backend = ScriptedBackend::new().with_error(LlmError::RetriesExhausted {
        attempts: 3,
        last_error: "HTTP 502".into(),
    });
    let mut session = Session::open(&memoryless(), backend).expect("open");

    let outcome = session.take_turn("Hello?").await;
    assert_eq!(outcome.reply.source, ReplySource::Fallback);
    assert!(matches!(outcome.extraction, ActionExtraction::Delimited(_)));
    assert_eq!(session.assembler().user().history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_model_times_out() {
    let backend = ScriptedBackend::new()
        .with_reply("*never arrives*")
        .with_delay(Duration::from_secs(600));
    let mut session = Session::open(&memoryless(), backend).expect("open");

    let outcome = session.take_turn("Are you there?").await;
    assert_eq!(outcome.reply.source, ReplySource::Fallback);
    assert_ne!(outcome.reply.full_text, "*never arrives*");
}

#[tokio::test]
async fn autosave_survives_reopen() {
    for backend in ["json", "sqlite"] {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(&dir, backend);

        let mut first = Session::open(
            &config,
            ScriptedBackend::new().with_reply("*grabs her bag* 'Lead the way.'"),
        )
        .expect("open");
        assert!(!first.restored());
        first.take_turn("Let's go to the park").await;
        let saved_history = first.assembler().user().history().to_vec();
        drop(first);

        let second = Session::open(&config, ScriptedBackend::unavailable()).expect("reopen");
        assert!(second.restored(), "{backend} snapshot should restore");
        let a = second.assembler();
        assert_eq!(a.cascade().dynamic.location(), "Park");
        assert_eq!(a.user().history(), saved_history.as_slice());
        assert_eq!(
            a.cascade().dynamic.last_narrative_action(),
            Some("*grabs her bag*")
        );
    }
}

#[tokio::test]
async fn corrupt_save_starts_fresh() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(&dir, "json");
    std::fs::write(&config.persistence.path, b"not json at all").expect("write");

    let mut session = Session::open(&config, ScriptedBackend::unavailable()).expect("open");
    assert!(!session.restored());

    session.take_turn("Hi").await;
    assert!(session.save().expect("save"));
    let reopened = Session::open(&config, ScriptedBackend::unavailable()).expect("reopen");
    assert!(reopened.restored());
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = memoryless();
    config.memory.summary_size = 0;
    assert!(matches!(
        Session::open(&config, ScriptedBackend::new()),
        Err(ReverieError::Config(_))
    ));
}

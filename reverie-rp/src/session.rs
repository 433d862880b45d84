//! A running roleplay session: one assembler, one generator, one store.

use reverie_core::context::ActionExtraction;
use reverie_core::error::Result;
use reverie_core::persistence::{self, SnapshotStore};
use reverie_core::{ContextAssembler, ResponseGuidance, ReverieConfig};
use reverie_llm::LlmBackend;
use tracing::{debug, info, warn};

use crate::dialogue::{DialogueGenerator, GeneratedReply};

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The character's reply.
    pub reply: GeneratedReply,
    /// Guidance the reply was generated under.
    pub guidance: ResponseGuidance,
    /// How the narrative action was read back out of the reply.
    pub extraction: ActionExtraction,
}

/// Owns all per-session state. Turns are strictly sequential.
pub struct Session<B> {
    assembler: ContextAssembler,
    generator: DialogueGenerator<B>,
    store: Option<Box<dyn SnapshotStore>>,
    autosave: bool,
    restored: bool,
}

impl<B> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_store", &self.store.is_some())
            .field("autosave", &self.autosave)
            .field("restored", &self.restored)
            .finish_non_exhaustive()
    }
}

impl<B: LlmBackend> Session<B> {
    /// Validate `config`, open the configured store and restore the last
    /// snapshot if one loads cleanly.
    ///
    /// # Errors
    /// Returns an error for an invalid config or a store that cannot be
    /// opened. An unreadable snapshot is not an error.
    pub fn open(config: &ReverieConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let store = persistence::open_store(&config.persistence)?;
        Ok(Self::with_store(config, backend, store))
    }

    /// Build a session around an explicit store. The config is assumed valid.
    pub fn with_store(
        config: &ReverieConfig,
        backend: B,
        store: Option<Box<dyn SnapshotStore>>,
    ) -> Self {
        let mut assembler = ContextAssembler::new(config);
        let restored = store
            .as_deref()
            .is_some_and(|s| assembler.restore_or_default(s));
        info!(
            restored,
            persistence = %config.persistence.backend,
            "Session opened"
        );
        Self {
            assembler,
            generator: DialogueGenerator::new(backend, &config.llm),
            store,
            autosave: config.persistence.autosave,
            restored,
        }
    }

    /// Establish the opening scene of a fresh session.
    pub fn seed_opening(&mut self, location: &str, action: &str, event: &str) {
        self.assembler.seed_scene(location, action, event);
    }

    /// Run one turn: build the context, generate a reply, then fold the
    /// exchange back into memory and autosave.
    pub async fn take_turn(&mut self, input: &str) -> TurnOutcome {
        let ctx = self.assembler.construct_context(input);
        let reply = self.generator.generate(&ctx).await;
        let extraction = self.assembler.manage_dynamic_memory(input, &reply.full_text);

        if self.autosave {
            if let Err(e) = self.save() {
                warn!(error = %e, "Autosave failed");
            }
        }

        TurnOutcome {
            reply,
            guidance: ctx.guidance,
            extraction,
        }
    }

    /// Write a snapshot now. Returns `false` when no store is configured.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn save(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        store.save(&self.assembler.snapshot())?;
        debug!("Session saved");
        Ok(true)
    }

    /// Session state.
    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Reply generator.
    pub fn generator(&self) -> &DialogueGenerator<B> {
        &self.generator
    }

    /// Whether state came from a saved snapshot.
    pub fn restored(&self) -> bool {
        self.restored
    }
}

//! Per-turn context assembly.
//!
//! [`ContextAssembler`] is the single owner of session state. A turn is two
//! calls:
//!
//! 1. [`ContextAssembler::construct_context`] before generation: infer the
//!    scene from the input, run the emotion engine, and fuse everything into
//!    a [`FusedContext`].
//! 2. [`ContextAssembler::manage_dynamic_memory`] after generation: advance
//!    the clock, file the turn into the memory cascade, and extract the
//!    character's narrative action from the reply.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::RoleplayClock;
use crate::config::{ContextConfig, KeywordMapping, MemoryConfig, ReverieConfig};
use crate::emotion::guidance::join_labels;
use crate::emotion::{EmotionalCore, ResponseGuidance};
use crate::error::Result;
use crate::memory::MemoryCascade;
use crate::persistence::{SNAPSHOT_VERSION, SessionSnapshot, SnapshotStore};
use crate::profile::{CharacterProfile, USER_CONTEXT_WINDOW, UserProfile};
use crate::types::{ContextFlags, LocationKind};

/// Placeholder recorded when no action can be found in a reply.
pub const UNPARSEABLE_ACTION: &str = "*[Action could not be parsed]*";

/// Longest first line accepted as a bare action.
const MAX_FIRST_LINE_ACTION: usize = 150;

static ACTION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\*(.*?)\*").ok());

/// How the narrative action was found in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionExtraction {
    /// The first `*...*` span, inner text trimmed.
    Delimited(String),
    /// A short first line that is itself wrapped in asterisks.
    FirstLine(String),
    /// Nothing usable.
    Unparseable,
}

impl ActionExtraction {
    /// The action text as stored for the next prompt.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Delimited(s) | Self::FirstLine(s) => s,
            Self::Unparseable => UNPARSEABLE_ACTION,
        }
    }
}

/// Pull the character's narrative action out of raw model text.
#[must_use]
pub fn extract_narrative_action(text: &str) -> ActionExtraction {
    if let Some(caps) = ACTION_PATTERN.as_ref().and_then(|re| re.captures(text)) {
        let inner = caps.get(1).map_or("", |m| m.as_str()).trim();
        return ActionExtraction::Delimited(format!("*{inner}*"));
    }

    let first_line = text.split('\n').next().unwrap_or_default().trim();
    if first_line.chars().count() < MAX_FIRST_LINE_ACTION
        && first_line.starts_with('*')
        && first_line.ends_with('*')
    {
        return ActionExtraction::FirstLine(first_line.to_owned());
    }
    ActionExtraction::Unparseable
}

/// Everything the dialogue generator sees for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedContext {
    /// Character display name.
    pub character_name: String,
    /// Character personality description.
    pub personality: String,
    /// Base relationship label toward the user.
    pub relationship_with_user: String,
    /// User display name.
    pub user_name: String,
    /// This turn's input.
    pub user_input: String,
    /// Scene location.
    pub location: String,
    /// Scene action.
    pub action: String,
    /// Roleplay time, e.g. `"Wednesday, 02:00 PM"`.
    pub current_time: String,
    /// Flags passed to the emotion engine.
    pub flags: ContextFlags,
    /// Emotion engine output.
    pub guidance: ResponseGuidance,
    /// Last turn's narrative action.
    pub previous_action: Option<String>,
    /// Dynamic-memory events, oldest first.
    pub dynamic_memory: Vec<String>,
    /// The most recent active-memory events, oldest first.
    pub active_memory: Vec<String>,
    /// Long-term entries, oldest first.
    pub long_term_memory: Vec<String>,
    /// The most recent things the character said to the user.
    pub user_memories: Vec<String>,
}

/// Owner of all per-session state.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    context_config: ContextConfig,
    memory_config: MemoryConfig,
    character: CharacterProfile,
    user: UserProfile,
    core: EmotionalCore,
    cascade: MemoryCascade,
    clock: RoleplayClock,
}

impl ContextAssembler {
    /// Fresh session state.
    #[must_use]
    pub fn new(config: &ReverieConfig) -> Self {
        Self {
            context_config: config.context.clone(),
            memory_config: config.memory.clone(),
            character: CharacterProfile::from(&config.character),
            user: UserProfile::from(&config.user),
            core: EmotionalCore::new(&config.emotion),
            cascade: MemoryCascade::new(&config.memory),
            clock: RoleplayClock::new(&config.context),
        }
    }

    /// Infer scene and mood, then fuse everything for the generator.
    pub fn construct_context(&mut self, user_input: &str) -> FusedContext {
        self.update_location_and_action(user_input);

        let flags = self.context_flags(user_input);
        debug!(?flags, "Context flags determined");
        let guidance = self.core.process_interaction(user_input, flags);

        let dynamic = &self.cascade.dynamic;
        let context = FusedContext {
            character_name: self.character.name.clone(),
            personality: self.character.personality.clone(),
            relationship_with_user: self.character.relationship_with_user.clone(),
            user_name: self.user.name.clone(),
            user_input: user_input.to_owned(),
            location: dynamic.location().to_owned(),
            action: dynamic.current_action().to_owned(),
            current_time: self.clock.display(),
            flags,
            guidance,
            previous_action: dynamic.last_narrative_action().map(str::to_owned),
            dynamic_memory: dynamic.memories().map(str::to_owned).collect(),
            active_memory: self
                .cascade
                .active
                .recent(self.memory_config.active_context_count)
                .to_vec(),
            long_term_memory: self.cascade.long_term.get_memories().to_vec(),
            user_memories: self.user.recent_memories(USER_CONTEXT_WINDOW).to_vec(),
        };
        info!(
            location = %context.location,
            attitude = %context.guidance.attitude,
            "Context constructed"
        );
        context
    }

    fn context_flags(&self, user_input: &str) -> ContextFlags {
        let location = if self.cascade.dynamic.location() == self.character.private_location {
            LocationKind::Private
        } else {
            LocationKind::Public
        };
        let lowered = user_input.to_lowercase();
        ContextFlags {
            location,
            recent_failure: self
                .cascade
                .recent_mentions("fail", self.memory_config.active_context_count),
            high_impact_event: self
                .context_config
                .crisis_keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase())),
        }
    }

    /// File the finished turn and prepare state for the next one.
    ///
    /// Returns how the narrative action was extracted.
    pub fn manage_dynamic_memory(
        &mut self,
        user_input: &str,
        full_response: &str,
    ) -> ActionExtraction {
        self.clock.tick();

        let labels = join_labels(&self.core.emotional_state());
        let event = format!(
            "{user} said: '{user_input}'. {character} responded: '{full_response}'. [Emotional state: {labels}]",
            user = self.user.name,
            character = self.character.name,
        );
        self.cascade.add_memory(event);
        self.user
            .add_memory(format!("{} said: '{full_response}'", self.character.name));

        let extraction = extract_narrative_action(full_response);
        match &extraction {
            ActionExtraction::Delimited(action) => debug!(%action, "Extracted narrative action"),
            ActionExtraction::FirstLine(action) => {
                warn!(%action, "No delimited action found, using first line");
            }
            ActionExtraction::Unparseable => {
                let preview: String = full_response.chars().take(100).collect();
                warn!(%preview, "Could not parse narrative action");
            }
        }
        self.cascade
            .dynamic
            .set_last_narrative_action(extraction.as_str());

        self.update_location_and_action(user_input);
        extraction
    }

    /// Apply the first matching location and action keywords. Returns
    /// whether anything changed.
    pub fn update_location_and_action(&mut self, user_input: &str) -> bool {
        let lowered = user_input.to_lowercase();
        let first_match = |table: &[KeywordMapping]| {
            table
                .iter()
                .find(|m| lowered.contains(&m.keyword.to_lowercase()))
                .map(|m| m.value.clone())
        };

        let location = first_match(&self.context_config.locations);
        let action = first_match(&self.context_config.actions);

        let moved = location.is_some_and(|l| self.cascade.update_location(&l));
        let started = action.is_some_and(|a| self.cascade.update_action(&a));
        if moved || started {
            info!(
                location = %self.cascade.dynamic.location(),
                action = %self.cascade.dynamic.current_action(),
                "Scene updated from input"
            );
        }
        moved || started
    }

    /// Set the opening scene and record a backstory event.
    pub fn seed_scene(&mut self, location: &str, action: &str, event: &str) {
        self.cascade.update_location(location);
        self.cascade.update_action(action);
        self.cascade.add_memory(event);
        info!(location, action, "Opening scene seeded");
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Capture the full session state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let dynamic = &self.cascade.dynamic;
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            roleplay_time: self.clock.now(),
            location: dynamic.location().to_owned(),
            current_action: dynamic.current_action().to_owned(),
            last_narrative_action: dynamic.last_narrative_action().map(str::to_owned),
            dynamic_memories: dynamic.memories().map(str::to_owned).collect(),
            active_memories: self.cascade.active.memories().to_vec(),
            active_message_count: self.cascade.active.message_count(),
            long_term_memories: self.cascade.long_term.get_memories().to_vec(),
            user_history: self.user.history().to_vec(),
            emotional_core: self.core.clone(),
        }
    }

    /// Replace session state with `snapshot` after validating it.
    ///
    /// # Errors
    /// Returns [`crate::ReverieError::CorruptSnapshot`] and leaves state
    /// untouched if the snapshot is inconsistent.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> Result<()> {
        snapshot.validate()?;
        self.clock.restore(snapshot.roleplay_time);
        self.cascade.dynamic.restore(
            snapshot.location,
            snapshot.current_action,
            snapshot.last_narrative_action,
            snapshot.dynamic_memories,
        );
        self.cascade
            .active
            .restore(snapshot.active_memories, snapshot.active_message_count);
        self.cascade.long_term.restore(snapshot.long_term_memories);
        self.user.restore_history(snapshot.user_history);
        self.core = snapshot.emotional_core;
        info!(time = %self.clock.display(), "Session state restored");
        Ok(())
    }

    /// Load from `store` if possible. Any failure is logged and the current
    /// (default) state is kept. Returns whether a snapshot was applied.
    pub fn restore_or_default(&mut self, store: &dyn SnapshotStore) -> bool {
        let loaded = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("No saved session, starting fresh");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session snapshot");
                return false;
            }
        };
        match self.restore(loaded) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Discarding inconsistent session snapshot");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// The emotion engine.
    #[must_use]
    pub fn core(&self) -> &EmotionalCore {
        &self.core
    }

    /// Mutable access to the emotion engine, for scenario setup.
    pub fn core_mut(&mut self) -> &mut EmotionalCore {
        &mut self.core
    }

    /// The memory tiers.
    #[must_use]
    pub fn cascade(&self) -> &MemoryCascade {
        &self.cascade
    }

    /// Character profile.
    #[must_use]
    pub fn character(&self) -> &CharacterProfile {
        &self.character
    }

    /// User profile.
    #[must_use]
    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    /// Roleplay clock.
    #[must_use]
    pub fn clock(&self) -> &RoleplayClock {
        &self.clock
    }
}

//! Static character and user profiles.

use serde::{Deserialize, Serialize};

use crate::config::{CharacterConfig, UserConfig};

/// Number of user-history entries surfaced in each turn's context.
pub const USER_CONTEXT_WINDOW: usize = 3;

/// The roleplayed character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Display name.
    pub name: String,
    /// Free-text personality description for prompts.
    pub personality: String,
    /// Base relationship label toward the user.
    pub relationship_with_user: String,
    /// The one location treated as private.
    pub private_location: String,
}

impl From<&CharacterConfig> for CharacterProfile {
    fn from(config: &CharacterConfig) -> Self {
        Self {
            name: config.name.clone(),
            personality: config.personality.clone(),
            relationship_with_user: config.relationship_with_user.clone(),
            private_location: config.private_location.clone(),
        }
    }
}

/// The human participant and what the character has said to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name.
    pub name: String,
    /// How the user relates to the character.
    pub relationship_with_character: String,
    history: Vec<String>,
}

impl From<&UserConfig> for UserProfile {
    fn from(config: &UserConfig) -> Self {
        Self {
            name: config.name.clone(),
            relationship_with_character: config.relationship_with_character.clone(),
            history: Vec::new(),
        }
    }
}

impl UserProfile {
    /// Append a history entry.
    pub fn add_memory(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn recent_memories(&self, n: usize) -> &[String] {
        &self.history[self.history.len().saturating_sub(n)..]
    }

    /// Full history.
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Replace history from persisted state.
    pub fn restore_history(&mut self, history: Vec<String>) {
        self.history = history;
    }
}

//! The three-tier memory cascade.
//!
//! Events enter [`DynamicMemory`]. Relevant ones move on to
//! [`ActiveMemory`], which periodically compacts a batch into
//! [`LongTermMemory`]. Each tier owns its buffer; [`MemoryCascade`] performs
//! every move so a tier never reaches into another.

pub mod active;
pub mod dynamic;
pub mod long_term;

pub use active::ActiveMemory;
pub use dynamic::DynamicMemory;
pub use long_term::LongTermMemory;

use tracing::debug;

use crate::config::MemoryConfig;

/// Owner of all three tiers.
#[derive(Debug, Clone)]
pub struct MemoryCascade {
    /// Short-term tier and current scene.
    pub dynamic: DynamicMemory,
    /// Mid-term tier.
    pub active: ActiveMemory,
    /// Long-term tier.
    pub long_term: LongTermMemory,
}

impl MemoryCascade {
    /// Empty tiers built from `config`.
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            dynamic: DynamicMemory::new(config),
            active: ActiveMemory::new(config),
            long_term: LongTermMemory::new(),
        }
    }

    /// Record an event and run any resulting moves.
    pub fn add_memory(&mut self, event: impl Into<String>) {
        let Some(forward) = self.dynamic.add_memory(event) else {
            return;
        };
        if self.active.contains(&forward) {
            return;
        }
        debug!(event = %forward, "Forwarding to active memory");
        if let Some(batch) = self.active.add_memory(forward) {
            self.long_term.store(batch);
        }
    }

    /// Move to `location`. Returns whether anything changed.
    pub fn update_location(&mut self, location: &str) -> bool {
        match self.dynamic.set_location(location) {
            Some(event) => {
                self.add_memory(event);
                true
            }
            None => false,
        }
    }

    /// Start `action`. Returns whether anything changed.
    pub fn update_action(&mut self, action: &str) -> bool {
        match self.dynamic.set_action(action) {
            Some(event) => {
                self.add_memory(event);
                true
            }
            None => false,
        }
    }

    /// Whether any dynamic memory, or one of the last `active_window` active
    /// memories, mentions `needle` (case-insensitive).
    #[must_use]
    pub fn recent_mentions(&self, needle: &str, active_window: usize) -> bool {
        let needle = needle.to_lowercase();
        self.dynamic
            .memories()
            .chain(self.active.recent(active_window).iter().map(String::as_str))
            .any(|m| m.to_lowercase().contains(&needle))
    }
}

//! Durable, unbounded summaries.

use tracing::info;

/// The long-term tier.
///
/// Two insert paths with different semantics: [`Self::add_event`] skips
/// exact duplicates, [`Self::store`] appends a compacted batch verbatim.
#[derive(Debug, Clone, Default)]
pub struct LongTermMemory {
    memory: Vec<String>,
}

impl LongTermMemory {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event` unless an identical entry exists. Returns whether it
    /// was added.
    pub fn add_event(&mut self, event: impl Into<String>) -> bool {
        let event = event.into();
        if self.memory.contains(&event) {
            return false;
        }
        info!(event = %event, "Added long-term memory");
        self.memory.push(event);
        true
    }

    /// Append a compacted batch without deduplication.
    pub fn store(&mut self, batch: Vec<String>) {
        info!(count = batch.len(), total = self.memory.len() + batch.len(), "Archived batch");
        self.memory.extend(batch);
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn get_memories(&self) -> &[String] {
        &self.memory
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.memory.clear();
    }

    /// Replace contents from persisted state.
    pub fn restore(&mut self, memory: Vec<String>) {
        self.memory = memory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_event_dedupes_but_store_does_not() {
        let mut ltm = LongTermMemory::new();
        assert!(ltm.add_event("met at school"));
        assert!(!ltm.add_event("met at school"));
        ltm.store(vec!["met at school".into(), "met at school".into()]);
        assert_eq!(ltm.len(), 3);
        ltm.clear();
        assert!(ltm.is_empty());
    }
}

//! Mid-term memory with threshold compaction.

use tracing::{debug, info};

use crate::config::MemoryConfig;

/// The mid-term tier.
///
/// Accumulates events until `threshold` is reached, then compacts the oldest
/// `threshold` of them into `summary_size` entries for long-term storage.
#[derive(Debug, Clone)]
pub struct ActiveMemory {
    memories: Vec<String>,
    message_count: u64,
    threshold: usize,
    summary_size: usize,
    important_keywords: Vec<String>,
    progress_log_interval: u64,
}

impl ActiveMemory {
    /// Empty mid-term memory.
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        let summary_size = config.summary_size.max(1);
        Self {
            memories: Vec::new(),
            message_count: 0,
            threshold: config.active_threshold.max(summary_size),
            summary_size,
            important_keywords: config
                .importance_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            progress_log_interval: config.progress_log_interval,
        }
    }

    /// Append an event. Returns the compacted batch when this insert reached
    /// the threshold; the caller hands it to long-term storage.
    pub fn add_memory(&mut self, event: impl Into<String>) -> Option<Vec<String>> {
        self.memories.push(event.into());
        self.message_count += 1;

        if self.progress_log_interval > 0 && self.message_count % self.progress_log_interval == 0 {
            info!(
                messages = self.message_count,
                buffered = self.memories.len(),
                "Active memory progress"
            );
        }

        (self.memories.len() >= self.threshold).then(|| self.compact())
    }

    fn is_important(&self, event: &str) -> bool {
        let lowered = event.to_lowercase();
        self.important_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()))
    }

    /// Drain the oldest `threshold` events and reduce them to exactly
    /// `summary_size` entries: important events first, padded with the
    /// newest events of the batch.
    fn compact(&mut self) -> Vec<String> {
        let batch: Vec<String> = self.memories.drain(..self.threshold).collect();

        let important: Vec<&String> = batch.iter().filter(|e| self.is_important(e)).collect();
        let compacted: Vec<String> = if important.len() >= self.summary_size {
            important
                .into_iter()
                .take(self.summary_size)
                .cloned()
                .collect()
        } else {
            let pad = self.summary_size - important.len();
            important
                .into_iter()
                .chain(&batch[batch.len() - pad..])
                .cloned()
                .collect()
        };

        debug!(
            batch = batch.len(),
            kept = compacted.len(),
            remaining = self.memories.len(),
            "Compacted active memory"
        );
        compacted
    }

    /// Whether `event` is currently buffered.
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.memories.iter().any(|m| m == event)
    }

    /// The last `n` buffered events, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[String] {
        &self.memories[self.memories.len().saturating_sub(n)..]
    }

    /// All buffered events, oldest first.
    #[must_use]
    pub fn memories(&self) -> &[String] {
        &self.memories
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Events ever inserted, including compacted ones.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Compaction threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Entries produced per compaction.
    #[must_use]
    pub fn summary_size(&self) -> usize {
        self.summary_size
    }

    /// Replace the buffer and counter from persisted state.
    pub fn restore(&mut self, memories: Vec<String>, message_count: u64) {
        self.memories = memories;
        self.message_count = message_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ActiveMemory {
        ActiveMemory::new(&MemoryConfig {
            active_threshold: 5,
            summary_size: 3,
            ..MemoryConfig::default()
        })
    }

    #[test]
    fn compaction_prefers_important_events() {
        let mut m = small();
        for e in ["went to the park", "x", "school day", "y"] {
            assert!(m.add_memory(e).is_none());
        }
        let batch = m.add_memory("project talk").expect("threshold reached");
        assert_eq!(batch, vec!["went to the park", "school day", "project talk"]);
        assert!(m.is_empty());
        assert_eq!(m.message_count(), 5);
    }

    #[test]
    fn compaction_pads_with_newest_batch_entries() {
        let mut m = small();
        for e in ["park", "a", "b", "c"] {
            m.add_memory(e);
        }
        let batch = m.add_memory("d").expect("threshold reached");
        assert_eq!(batch, vec!["park", "c", "d"]);
    }

    #[test]
    fn recent_returns_tail() {
        let mut m = small();
        for e in ["a", "b", "c"] {
            m.add_memory(e);
        }
        assert_eq!(m.recent(2), ["b", "c"]);
        assert_eq!(m.recent(10).len(), 3);
        assert!(m.contains("a"));
    }
}

//! Working memory: the last few events plus the current scene.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::MemoryConfig;

/// Scene location used before anything has been inferred.
pub const DEFAULT_LOCATION: &str = "Science class";
/// Scene action used before anything has been inferred.
pub const DEFAULT_ACTION: &str = "Sitting with the user after being paired for a project";

/// The short-term tier.
///
/// Holds at most `max_events` events. When an event is pushed out, or when a
/// new event arrives while there is still room, it may be selected for
/// forwarding to [`super::ActiveMemory`]; the caller performs the move.
#[derive(Debug, Clone)]
pub struct DynamicMemory {
    location: String,
    current_action: String,
    last_narrative_action: Option<String>,
    memories: VecDeque<String>,
    max_events: usize,
    relevance_keywords: Vec<String>,
}

impl DynamicMemory {
    /// Empty working memory at the default scene.
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            location: DEFAULT_LOCATION.to_owned(),
            current_action: DEFAULT_ACTION.to_owned(),
            last_narrative_action: None,
            memories: VecDeque::with_capacity(config.max_events + 1),
            max_events: config.max_events.max(1),
            relevance_keywords: config
                .relevance_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// Whether `event` mentions any relevance keyword.
    #[must_use]
    pub fn is_relevant(&self, event: &str) -> bool {
        let lowered = event.to_lowercase();
        self.relevance_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()))
    }

    /// Append an event and return the one (if any) to forward downstream.
    ///
    /// Over capacity, the evicted event is the candidate. Otherwise the new
    /// event itself is. Either way only relevant events are returned, and at
    /// most one per call.
    pub fn add_memory(&mut self, event: impl Into<String>) -> Option<String> {
        let event = event.into();
        self.memories.push_back(event);

        if self.memories.len() > self.max_events {
            let evicted = self.memories.pop_front()?;
            debug!(event = %evicted, "Evicted from dynamic memory");
            return self.is_relevant(&evicted).then_some(evicted);
        }

        self.memories
            .back()
            .filter(|e| self.is_relevant(e))
            .cloned()
    }

    /// Move to `location`. Returns the synthesized event, or `None` when the
    /// location is unchanged. The caller records the event.
    pub fn set_location(&mut self, location: &str) -> Option<String> {
        if self.location == location {
            return None;
        }
        location.clone_into(&mut self.location);
        Some(format!("Moved to {location}."))
    }

    /// Start `action`. Returns the synthesized event, or `None` when the
    /// action is unchanged. The caller records the event.
    pub fn set_action(&mut self, action: &str) -> Option<String> {
        if self.current_action == action {
            return None;
        }
        action.clone_into(&mut self.current_action);
        Some(format!("Started {}.", action.to_lowercase()))
    }

    /// Remember the last `*...*` action the character performed.
    pub fn set_last_narrative_action(&mut self, action: impl Into<String>) {
        self.last_narrative_action = Some(action.into());
    }

    /// Current location.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Current action.
    #[must_use]
    pub fn current_action(&self) -> &str {
        &self.current_action
    }

    /// Last narrative action, if one was extracted.
    #[must_use]
    pub fn last_narrative_action(&self) -> Option<&str> {
        self.last_narrative_action.as_deref()
    }

    /// Buffered events, oldest first.
    pub fn memories(&self) -> impl Iterator<Item = &str> {
        self.memories.iter().map(String::as_str)
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Capacity.
    #[must_use]
    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// `"Summary of recent events: a | b | c"`.
    #[must_use]
    pub fn summarize(&self) -> String {
        format!(
            "Summary of recent events: {}",
            self.memories().collect::<Vec<_>>().join(" | ")
        )
    }

    /// Replace scene and buffer from persisted state. Excess events beyond
    /// capacity are dropped from the front.
    pub fn restore(
        &mut self,
        location: String,
        current_action: String,
        last_narrative_action: Option<String>,
        memories: Vec<String>,
    ) {
        self.location = location;
        self.current_action = current_action;
        self.last_narrative_action = last_narrative_action;
        self.memories = memories.into();
        while self.memories.len() > self.max_events {
            self.memories.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic() -> DynamicMemory {
        DynamicMemory::new(&MemoryConfig::default())
    }

    #[test]
    fn relevant_event_forwards_on_insert_under_capacity() {
        let mut m = dynamic();
        assert_eq!(m.add_memory("We talked"), None);
        assert_eq!(
            m.add_memory("Worked on the project").as_deref(),
            Some("Worked on the project")
        );
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn eviction_forwards_only_relevant_oldest() {
        let mut m = dynamic();
        m.add_memory("Talked about the project");
        m.add_memory("a");
        m.add_memory("b");
        // Over capacity: the project event is evicted and forwarded.
        assert_eq!(
            m.add_memory("c").as_deref(),
            Some("Talked about the project")
        );
        // Over capacity again: "a" is evicted and irrelevant. The new event
        // is relevant but is not forwarded on this call.
        assert_eq!(m.add_memory("tears again"), None);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn unchanged_location_is_a_no_op() {
        let mut m = dynamic();
        assert_eq!(m.set_location(DEFAULT_LOCATION), None);
        assert_eq!(m.set_action(DEFAULT_ACTION), None);
        assert_eq!(m.set_location("Park").as_deref(), Some("Moved to Park."));
        assert_eq!(
            m.set_action("Relaxing").as_deref(),
            Some("Started relaxing.")
        );
        assert_eq!(m.location(), "Park");
    }

    #[test]
    fn summary_joins_events() {
        let mut m = dynamic();
        m.add_memory("one");
        m.add_memory("two");
        assert_eq!(m.summarize(), "Summary of recent events: one | two");
    }
}

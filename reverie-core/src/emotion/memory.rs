//! Emotional memories and the trigger-word index.
//!
//! The memory log is append-only, so the trigger index stores positions into
//! it rather than copies.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ContextFlags, EmotionDimension, EmotionDimensions, EmotionImpact};

/// Intensity above which a turn is always remembered.
pub const MEMORY_INTENSITY_THRESHOLD: f32 = 0.5;
/// Intensity above which a remembered turn also becomes a trigger.
pub const TRIGGER_INTENSITY_THRESHOLD: f32 = 0.7;
/// Replay damping applied to a triggered memory's response.
pub const TRIGGER_REPLAY_FACTOR: f32 = 0.5;

/// A remembered emotionally significant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalMemory {
    /// Unique identifier.
    pub id: Uuid,
    /// The message that caused it.
    pub content: String,
    /// Situation flags at the time.
    pub context: ContextFlags,
    /// Impact entries with magnitude above `0.1`.
    pub emotional_response: BTreeMap<EmotionDimension, f32>,
    /// Internal emotions right after the update.
    pub internal_state: EmotionDimensions,
    /// Whether any defense was up.
    pub defense_active: bool,
    /// Turn intensity.
    pub significance: f32,
    /// When it was formed.
    pub timestamp: DateTime<Utc>,
}

/// Whether a turn is significant enough to remember.
///
/// Either the impact is intense, or some dimension sits far from neutral
/// while its impact delta differs from its current value by more than `0.2`.
#[must_use]
pub fn is_memorable(internal: &EmotionDimensions, impact: &EmotionImpact) -> bool {
    if impact.intensity() > MEMORY_INTENSITY_THRESHOLD {
        return true;
    }
    EmotionDimension::ALL.into_iter().any(|d| {
        let value = internal.get(d);
        (value - 0.5).abs() > 0.3 && (value - impact.get(d)).abs() > 0.2
    })
}

/// Candidate trigger words: the first two lowercase tokens longer than
/// three characters.
#[must_use]
pub fn trigger_words(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .take(2)
        .map(str::to_owned)
        .collect()
}

/// Distinct lowercase whitespace tokens of `message`, in order of first
/// appearance.
pub(crate) fn distinct_tokens(message: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    message
        .to_lowercase()
        .split_whitespace()
        .filter(|t| seen.insert((*t).to_owned()))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_words_skip_short_tokens() {
        let words = trigger_words("I am so SORRY about everything today");
        assert_eq!(words, vec!["sorry", "about"]);
    }

    #[test]
    fn distinct_tokens_dedupe() {
        let tokens = distinct_tokens("Sorry sorry SORRY okay");
        assert_eq!(tokens, vec!["sorry", "okay"]);
    }

    #[test]
    fn intense_turn_is_memorable() {
        let mut impact = EmotionImpact::default();
        impact.add(EmotionDimension::Connection, 0.6);
        assert!(is_memorable(&EmotionDimensions::default(), &impact));
    }

    #[test]
    fn displaced_dimension_is_memorable_even_when_quiet() {
        // Default connection is 0.1: displaced by 0.4 and far from a zero delta.
        assert!(is_memorable(
            &EmotionDimensions::default(),
            &EmotionImpact::default()
        ));
    }

    #[test]
    fn centred_state_with_quiet_turn_is_not_memorable() {
        let centred = EmotionDimensions {
            vulnerability: 0.5,
            connection: 0.5,
            autonomy: 0.5,
            validation: 0.5,
            authenticity: 0.5,
            psychological_safety: 0.5,
        };
        assert!(!is_memorable(&centred, &EmotionImpact::default()));
    }
}

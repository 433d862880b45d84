//! The affective engine.
//!
//! [`EmotionalCore`] keeps two emotion vectors: what the character feels
//! and what the character shows. Each turn runs a fixed pipeline:
//!
//! 1. keyword impact analysis
//! 2. trigger replay from past emotional memories
//! 3. internal update (inertia, context, coupling)
//! 4. defense evaluation
//! 5. expressed-emotion transform
//! 6. relationship update
//! 7. emotional-memory formation
//! 8. personality drift
//! 9. guidance generation
//!
//! Later steps read state written by earlier ones, so the order is fixed.

pub mod defense;
pub mod guidance;
pub mod impact;
pub mod memory;

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::EmotionConfig;
use crate::types::{
    ContextFlags, EmotionDimension, EmotionDimensions, EmotionImpact, LocationKind,
    PersonalityTraits, RelationshipState, UnconsciousPatterns,
};

pub use defense::{Defense, DefenseKind};
pub use guidance::{Attitude, EmotionalStateLabel, RelationshipLabel, ResponseGuidance, Tone};
pub use memory::EmotionalMemory;

/// Personality increment per qualifying turn.
const CHANGE_FACTOR: f32 = 0.02;
/// Intensity a turn needs before personality moves at all.
const PERSONALITY_INTENSITY_THRESHOLD: f32 = 0.6;

/// Full affective state of one character.
///
/// Everything except the transient per-turn defenses is serialized, so a
/// restored core continues exactly where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalCore {
    internal: EmotionDimensions,
    expressed: EmotionDimensions,
    personality: PersonalityTraits,
    unconscious: UnconsciousPatterns,
    relationship: RelationshipState,
    emotional_inertia: f32,
    emotional_volatility: f32,
    defense_activation: f32,
    emotional_memories: Vec<EmotionalMemory>,
    /// Trigger word → positions in `emotional_memories`.
    emotional_triggers: BTreeMap<String, Vec<usize>>,
    #[serde(skip)]
    active_defenses: Vec<Defense>,
}

impl Default for EmotionalCore {
    fn default() -> Self {
        Self::new(&EmotionConfig::default())
    }
}

impl EmotionalCore {
    /// A fresh core at the guarded baseline.
    #[must_use]
    pub fn new(config: &EmotionConfig) -> Self {
        let internal = EmotionDimensions::default();
        Self {
            internal,
            expressed: internal,
            personality: PersonalityTraits::default(),
            unconscious: UnconsciousPatterns::default(),
            relationship: RelationshipState::default(),
            emotional_inertia: config.emotional_inertia,
            emotional_volatility: config.emotional_volatility,
            defense_activation: config.defense_activation,
            emotional_memories: Vec::new(),
            emotional_triggers: BTreeMap::new(),
            active_defenses: Vec::new(),
        }
    }

    /// Replace the personality traits (clamped).
    #[must_use]
    pub fn with_personality(mut self, mut personality: PersonalityTraits) -> Self {
        personality.clamp();
        self.personality = personality;
        self
    }

    /// Replace the unconscious patterns (clamped).
    #[must_use]
    pub fn with_unconscious(mut self, mut patterns: UnconsciousPatterns) -> Self {
        patterns.clamp();
        self.unconscious = patterns;
        self
    }

    /// Overwrite the internal vector (clamped). Expressed follows it until
    /// the next turn.
    pub fn set_internal(&mut self, mut internal: EmotionDimensions) {
        internal.clamp_unit();
        self.internal = internal;
        self.expressed = internal;
    }

    /// Run one turn of the pipeline and return guidance for the reply.
    pub fn process_interaction(
        &mut self,
        message: &str,
        context: ContextFlags,
    ) -> ResponseGuidance {
        let mut impact = impact::analyze(message);

        let triggered = self.triggered_memories(message);
        if !triggered.is_empty() {
            debug!(count = triggered.len(), "Replaying triggered emotional memories");
            for idx in triggered {
                if let Some(past) = self.emotional_memories.get(idx) {
                    for (&dimension, &value) in &past.emotional_response {
                        impact.add(dimension, value * memory::TRIGGER_REPLAY_FACTOR);
                    }
                }
            }
        }

        self.update_internal(&impact, context);

        self.active_defenses = defense::evaluate(
            &self.internal,
            &self.personality,
            &self.unconscious,
            self.defense_activation,
        );
        self.expressed = defense::express(&self.internal, &self.active_defenses, &self.personality);

        self.update_relationship(&impact);
        self.form_memory(message, &impact, context);
        self.evolve_personality(&impact);

        let guidance = self.generate_guidance(&impact);
        debug!(
            intensity = impact.intensity(),
            defenses = self.active_defenses.len(),
            attitude = %guidance.attitude,
            tone = %guidance.tone,
            relationship = %guidance.relationship,
            "Processed interaction"
        );
        guidance
    }

    /// Positions of memories linked to any distinct token in `message`.
    fn triggered_memories(&self, message: &str) -> Vec<usize> {
        memory::distinct_tokens(message)
            .iter()
            .filter_map(|token| self.emotional_triggers.get(token))
            .flatten()
            .copied()
            .collect()
    }

    fn update_internal(&mut self, impact: &EmotionImpact, context: ContextFlags) {
        let responsiveness = 1.0 - self.emotional_inertia;
        for d in EmotionDimension::ALL {
            *self.internal.get_mut(d) += impact.get(d) * responsiveness;
        }
        self.internal.clamp_unit();

        let e = &mut self.internal;
        if context.location == LocationKind::Public {
            e.vulnerability *= 0.9;
            e.psychological_safety *= 0.9;
        }
        if context.recent_failure && impact.validation < 0.0 {
            e.validation += impact.validation * 0.5;
        }

        if e.vulnerability > 0.7 {
            e.autonomy *= 0.9;
        }
        if e.psychological_safety < 0.3 {
            e.vulnerability *= 0.8;
            e.authenticity *= 0.8;
        }
        if self.unconscious.fear_of_abandonment > 0.5 && e.connection < 0.3 {
            e.vulnerability += 0.15;
            e.psychological_safety -= 0.1;
        }
        e.clamp_unit();
    }

    fn update_relationship(&mut self, impact: &EmotionImpact) {
        let r = &mut self.relationship;

        let safety = impact.psychological_safety;
        r.trust_threshold += if safety > 0.0 { safety * 0.1 } else { safety * 0.2 };

        if self.internal.connection > r.trust_threshold {
            r.intimacy_level += 0.05;
        }

        let connection = impact.connection;
        r.psychological_distance -= if connection > 0.0 {
            connection * 0.1
        } else {
            connection * 0.15
        };

        r.clamp();
    }

    fn form_memory(&mut self, message: &str, impact: &EmotionImpact, context: ContextFlags) {
        if !memory::is_memorable(&self.internal, impact) {
            return;
        }

        let significance = impact.intensity();
        let record = EmotionalMemory {
            id: Uuid::new_v4(),
            content: message.to_owned(),
            context,
            emotional_response: impact.significant_entries().into_iter().collect(),
            internal_state: self.internal,
            defense_active: !self.active_defenses.is_empty(),
            significance,
            timestamp: Utc::now(),
        };
        let idx = self.emotional_memories.len();
        self.emotional_memories.push(record);

        if significance > memory::TRIGGER_INTENSITY_THRESHOLD {
            for word in memory::trigger_words(message) {
                debug!(trigger = %word, memory = idx, "Indexed emotional trigger");
                self.emotional_triggers.entry(word).or_default().push(idx);
            }
        }
    }

    fn evolve_personality(&mut self, impact: &EmotionImpact) {
        if impact.intensity() <= PERSONALITY_INTENSITY_THRESHOLD {
            return;
        }
        let p = &mut self.personality;

        if impact.vulnerability.abs() > 0.3 {
            p.emotional_awareness += CHANGE_FACTOR * 0.5;
        }
        if impact.connection > 0.2 {
            p.empathy += CHANGE_FACTOR;
        }
        if impact.authenticity > 0.2 {
            p.fear_of_vulnerability -= CHANGE_FACTOR;
        }
        if impact.validation > 0.3 {
            self.unconscious.self_worth_contingency += CHANGE_FACTOR;
        } else if impact.validation < -0.3 {
            if self.internal.psychological_safety > 0.6 {
                p.authenticity += CHANGE_FACTOR;
            } else {
                p.pride += CHANGE_FACTOR;
            }
        }

        p.clamp();
        self.unconscious.clamp();
    }

    fn generate_guidance(&self, impact: &EmotionImpact) -> ResponseGuidance {
        ResponseGuidance {
            emotional_state: guidance::state_labels(&self.internal),
            facade_intensity: self.internal.mean_abs_difference(&self.expressed),
            attitude: guidance::attitude(&self.expressed, &self.active_defenses, impact),
            emotional_conflicts: guidance::conflicts(&self.internal),
            nonverbal_cues: guidance::nonverbal_cues(&self.internal, &self.expressed),
            tone: guidance::tone(&self.expressed, &self.active_defenses),
            relationship: guidance::relationship(&self.relationship),
            active_defenses: self.active_defenses.iter().map(|d| d.kind).collect(),
            internal_feeling: self.internal.most_intense(),
            expressed_feeling: self.expressed.most_intense(),
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// Current state labels from internal emotions.
    #[must_use]
    pub fn emotional_state(&self) -> Vec<EmotionalStateLabel> {
        guidance::state_labels(&self.internal)
    }

    /// What is truly felt.
    #[must_use]
    pub fn internal(&self) -> &EmotionDimensions {
        &self.internal
    }

    /// What is shown.
    #[must_use]
    pub fn expressed(&self) -> &EmotionDimensions {
        &self.expressed
    }

    /// Personality traits.
    #[must_use]
    pub fn personality(&self) -> &PersonalityTraits {
        &self.personality
    }

    /// Unconscious patterns.
    #[must_use]
    pub fn unconscious(&self) -> &UnconsciousPatterns {
        &self.unconscious
    }

    /// Relationship scalars.
    #[must_use]
    pub fn relationship(&self) -> &RelationshipState {
        &self.relationship
    }

    /// Defenses raised during the last turn.
    #[must_use]
    pub fn active_defenses(&self) -> &[Defense] {
        &self.active_defenses
    }

    /// The append-only emotional-memory log.
    #[must_use]
    pub fn emotional_memories(&self) -> &[EmotionalMemory] {
        &self.emotional_memories
    }

    /// Memories indexed under `word` (lowercased).
    #[must_use]
    pub fn triggers_for(&self, word: &str) -> Vec<&EmotionalMemory> {
        self.emotional_triggers
            .get(&word.to_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.emotional_memories.get(idx))
            .collect()
    }

    /// Number of distinct trigger words.
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.emotional_triggers.len()
    }

    /// Emotional inertia in `[0, 1]`.
    #[must_use]
    pub fn emotional_inertia(&self) -> f32 {
        self.emotional_inertia
    }

    /// Emotional volatility. Carried with the state; no step reads it yet.
    #[must_use]
    pub fn emotional_volatility(&self) -> f32 {
        self.emotional_volatility
    }

    /// Vulnerability level above which defenses activate.
    #[must_use]
    pub fn defense_activation(&self) -> f32 {
        self.defense_activation
    }

    /// Check that every persisted scalar is in range and every trigger
    /// points at an existing memory. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if !self.internal.is_unit() {
            return Err("internal emotions out of [0, 1]".into());
        }
        if !self.expressed.is_unit() {
            return Err("expressed emotions out of [0, 1]".into());
        }
        if !self.personality.in_range() {
            return Err("personality traits out of range".into());
        }
        if !self.unconscious.in_range() {
            return Err("unconscious patterns out of range".into());
        }
        if !self.relationship.in_range() {
            return Err("relationship scalars out of range".into());
        }
        for (name, value) in [
            ("emotional_inertia", self.emotional_inertia),
            ("defense_activation", self.defense_activation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} out of [0, 1]"));
            }
        }
        let len = self.emotional_memories.len();
        if let Some(word) = self
            .emotional_triggers
            .iter()
            .find(|(_, idxs)| idxs.iter().any(|&i| i >= len))
            .map(|(w, _)| w)
        {
            return Err(format!("trigger '{word}' points past the memory log"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private() -> ContextFlags {
        ContextFlags {
            location: LocationKind::Private,
            ..ContextFlags::default()
        }
    }

    #[test]
    fn empathetic_message_raises_vulnerability_and_connection() {
        let mut core = EmotionalCore::default();
        let before = *core.internal();
        core.process_interaction("I understand, I'm sorry, we should do this together", private());
        assert!(core.internal().vulnerability > before.vulnerability);
        assert!(core.internal().connection > before.connection);
    }

    #[test]
    fn warm_message_is_never_cold_or_irritable() {
        let mut core = EmotionalCore::default();
        let guidance = core.process_interaction("Thanks for helping, I trust you", private());
        assert!(matches!(
            guidance.attitude,
            Attitude::Warm | Attitude::Genuine | Attitude::Guarded
        ));
    }

    #[test]
    fn hostile_message_cools_the_relationship() {
        let mut core = EmotionalCore::default();
        let before = *core.relationship();
        let guidance = core.process_interaction(
            "Whatever, you're stupid and this is your problem",
            ContextFlags::default(),
        );
        assert!(core.relationship().psychological_distance > before.psychological_distance);
        assert!(core.relationship().trust_threshold < before.trust_threshold);
        assert!(matches!(
            guidance.relationship,
            RelationshipLabel::Distant | RelationshipLabel::Hostile
        ));
    }

    #[test]
    fn repeated_hostility_turns_hostile() {
        let mut core = EmotionalCore::default();
        let mut last = RelationshipLabel::Neutral;
        for _ in 0..15 {
            last = core
                .process_interaction(
                    "Whatever, you're stupid and this is your problem",
                    ContextFlags::default(),
                )
                .relationship;
        }
        assert_eq!(last, RelationshipLabel::Hostile);
    }

    #[test]
    fn high_vulnerability_with_pride_triggers_reaction_formation() {
        let mut core = EmotionalCore::default();
        core.set_internal(EmotionDimensions {
            vulnerability: 0.95,
            psychological_safety: 0.8,
            connection: 0.5,
            ..EmotionDimensions::default()
        });
        let guidance = core.process_interaction("I understand how you feel", private());
        assert!(guidance.active_defenses.contains(&DefenseKind::ReactionFormation));
        assert!(core.expressed().vulnerability < core.internal().vulnerability);
        assert_eq!(guidance.attitude, Attitude::Dismissive);
    }

    #[test]
    fn intense_turn_indexes_triggers_and_replays_them() {
        let mut core = EmotionalCore::default();
        // Three vulnerability words, two connection words and "honest".
        let message = "Honestly, trust me, I care and understand, help";
        core.process_interaction(message, private());
        assert_eq!(core.emotional_memories().len(), 1);
        assert_eq!(core.triggers_for("honestly,").len(), 1);
        assert_eq!(core.triggers_for("trust").len(), 1);

        let before = *core.internal();
        core.process_interaction("trust", private());
        // Replay adds half of the remembered response on top of the keyword hit.
        assert!(core.internal().vulnerability >= before.vulnerability);
        assert!(core.check_invariants().is_ok());
    }

    #[test]
    fn personality_only_moves_on_intense_turns() {
        let mut core = EmotionalCore::default();
        let before = *core.personality();
        core.process_interaction("ok", private());
        assert_eq!(*core.personality(), before);

        core.process_interaction("We, us, together, friend, help - great and honest", private());
        assert!(core.personality().empathy > before.empathy);
        assert!(core.personality().in_range());
    }

    #[test]
    fn serde_round_trip_skips_defenses() {
        let mut core = EmotionalCore::default();
        core.set_internal(EmotionDimensions {
            vulnerability: 0.95,
            ..EmotionDimensions::default()
        });
        core.process_interaction("I feel so open with you, I trust you", private());
        assert!(!core.active_defenses().is_empty());

        let json = serde_json::to_string(&core).expect("serialize");
        let back: EmotionalCore = serde_json::from_str(&json).expect("deserialize");
        assert!(back.active_defenses().is_empty());
        assert_eq!(back.internal(), core.internal());
        assert_eq!(back.emotional_memories(), core.emotional_memories());
    }
}

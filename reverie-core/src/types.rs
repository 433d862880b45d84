//! Core type definitions for the Reverie affective model.
//!
//! All state types are serializable so a session can be snapshotted and
//! resumed exactly.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Emotion dimensions
// ---------------------------------------------------------------------------

/// One axis of the six-dimensional emotional model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionDimension {
    /// Feeling exposed (high) or protected (low).
    Vulnerability,
    /// Feeling close (high) or distant (low).
    Connection,
    /// Feeling in control (high) or controlled (low).
    Autonomy,
    /// Feeling affirmed (high) or rejected (low).
    Validation,
    /// Feeling true (high) or false (low) to oneself.
    Authenticity,
    /// The environment feels safe (high) or threatening (low).
    PsychologicalSafety,
}

impl EmotionDimension {
    /// Every dimension, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Vulnerability,
        Self::Connection,
        Self::Autonomy,
        Self::Validation,
        Self::Authenticity,
        Self::PsychologicalSafety,
    ];

    /// Snake-case name, as used in prompts and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vulnerability => "vulnerability",
            Self::Connection => "connection",
            Self::Autonomy => "autonomy",
            Self::Validation => "validation",
            Self::Authenticity => "authenticity",
            Self::PsychologicalSafety => "psychological_safety",
        }
    }
}

impl fmt::Display for EmotionDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A full emotion vector. Every component lives in `[0, 1]`.
///
/// Two of these exist per character: the *internal* vector (what is truly
/// felt) and the *expressed* vector (what is shown).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionDimensions {
    /// Exposed vs. protected.
    pub vulnerability: f32,
    /// Close vs. distant.
    pub connection: f32,
    /// In control vs. controlled.
    pub autonomy: f32,
    /// Affirmed vs. rejected.
    pub validation: f32,
    /// True vs. false to self.
    pub authenticity: f32,
    /// Safe vs. threatening environment.
    pub psychological_safety: f32,
}

impl Default for EmotionDimensions {
    /// The guarded baseline the character starts every new session with.
    fn default() -> Self {
        Self {
            vulnerability: 0.2,
            connection: 0.1,
            autonomy: 0.8,
            validation: 0.3,
            authenticity: 0.4,
            psychological_safety: 0.2,
        }
    }
}

impl EmotionDimensions {
    /// Read one dimension.
    #[must_use]
    pub fn get(&self, dimension: EmotionDimension) -> f32 {
        match dimension {
            EmotionDimension::Vulnerability => self.vulnerability,
            EmotionDimension::Connection => self.connection,
            EmotionDimension::Autonomy => self.autonomy,
            EmotionDimension::Validation => self.validation,
            EmotionDimension::Authenticity => self.authenticity,
            EmotionDimension::PsychologicalSafety => self.psychological_safety,
        }
    }

    /// Mutable access to one dimension.
    pub fn get_mut(&mut self, dimension: EmotionDimension) -> &mut f32 {
        match dimension {
            EmotionDimension::Vulnerability => &mut self.vulnerability,
            EmotionDimension::Connection => &mut self.connection,
            EmotionDimension::Autonomy => &mut self.autonomy,
            EmotionDimension::Validation => &mut self.validation,
            EmotionDimension::Authenticity => &mut self.authenticity,
            EmotionDimension::PsychologicalSafety => &mut self.psychological_safety,
        }
    }

    /// Iterate `(dimension, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (EmotionDimension, f32)> + '_ {
        EmotionDimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Clamp every component to `[0, 1]`.
    pub fn clamp_unit(&mut self) {
        for d in EmotionDimension::ALL {
            let v = self.get_mut(d);
            *v = v.clamp(0.0, 1.0);
        }
    }

    /// Whether every component lies in `[0, 1]`.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.iter().all(|(_, v)| (0.0..=1.0).contains(&v))
    }

    /// Sum of `|self[d] - other[d]|` over all dimensions.
    #[must_use]
    pub fn total_abs_difference(&self, other: &Self) -> f32 {
        self.iter().map(|(d, v)| (v - other.get(d)).abs()).sum()
    }

    /// Mean of `|self[d] - other[d]|` over all dimensions.
    #[must_use]
    pub fn mean_abs_difference(&self, other: &Self) -> f32 {
        self.total_abs_difference(other) / EmotionDimension::ALL.len() as f32
    }

    /// The dimension furthest from the neutral midpoint `0.5`, regardless of
    /// sign. Ties go to the earliest dimension in declaration order.
    #[must_use]
    pub fn most_intense(&self) -> EmotionDimension {
        EmotionDimension::ALL
            .into_iter()
            .rev()
            .max_by_key(|d| OrderedFloat((self.get(*d) - 0.5).abs()))
            .unwrap_or(EmotionDimension::Vulnerability)
    }
}

// ---------------------------------------------------------------------------
// Emotion impact
// ---------------------------------------------------------------------------

/// Raw signed per-dimension deltas produced by analysing one message.
///
/// Unlike [`EmotionDimensions`] these are *not* clamped; accumulation is
/// unbounded until the impact is applied to state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionImpact {
    /// Delta for vulnerability.
    pub vulnerability: f32,
    /// Delta for connection.
    pub connection: f32,
    /// Delta for autonomy.
    pub autonomy: f32,
    /// Delta for validation.
    pub validation: f32,
    /// Delta for authenticity.
    pub authenticity: f32,
    /// Delta for psychological safety.
    pub psychological_safety: f32,
}

impl EmotionImpact {
    /// Read one delta.
    #[must_use]
    pub fn get(&self, dimension: EmotionDimension) -> f32 {
        match dimension {
            EmotionDimension::Vulnerability => self.vulnerability,
            EmotionDimension::Connection => self.connection,
            EmotionDimension::Autonomy => self.autonomy,
            EmotionDimension::Validation => self.validation,
            EmotionDimension::Authenticity => self.authenticity,
            EmotionDimension::PsychologicalSafety => self.psychological_safety,
        }
    }

    /// Add `delta` to one dimension.
    pub fn add(&mut self, dimension: EmotionDimension, delta: f32) {
        let slot = match dimension {
            EmotionDimension::Vulnerability => &mut self.vulnerability,
            EmotionDimension::Connection => &mut self.connection,
            EmotionDimension::Autonomy => &mut self.autonomy,
            EmotionDimension::Validation => &mut self.validation,
            EmotionDimension::Authenticity => &mut self.authenticity,
            EmotionDimension::PsychologicalSafety => &mut self.psychological_safety,
        };
        *slot += delta;
    }

    /// Iterate `(dimension, delta)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (EmotionDimension, f32)> + '_ {
        EmotionDimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Overall intensity: `Σ |delta|`.
    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.iter().map(|(_, v)| v.abs()).sum()
    }

    /// Entries whose magnitude exceeds `0.1`, the part worth remembering.
    #[must_use]
    pub fn significant_entries(&self) -> Vec<(EmotionDimension, f32)> {
        self.iter().filter(|(_, v)| v.abs() > 0.1).collect()
    }
}

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

/// Lower bound for personality and unconscious-pattern scalars.
pub const TRAIT_MIN: f32 = 0.1;
/// Upper bound for personality and unconscious-pattern scalars.
pub const TRAIT_MAX: f32 = 0.9;

/// Slowly drifting personality traits, each clamped to `[0.1, 0.9]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    /// Drives reaction formation and suppressed vulnerability.
    pub pride: f32,
    /// Drives intellectualization.
    pub fear_of_vulnerability: f32,
    /// Desire to stay in charge of the interaction.
    pub need_for_control: f32,
    /// How accurately felt emotion reaches expression.
    pub emotional_awareness: f32,
    /// Responsiveness to others' feelings.
    pub empathy: f32,
    /// Willingness to show the true self.
    pub authenticity: f32,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            pride: 0.8,
            fear_of_vulnerability: 0.7,
            need_for_control: 0.8,
            emotional_awareness: 0.4,
            empathy: 0.3,
            authenticity: 0.4,
        }
    }
}

impl PersonalityTraits {
    /// Clamp every trait to `[TRAIT_MIN, TRAIT_MAX]`.
    pub fn clamp(&mut self) {
        for t in [
            &mut self.pride,
            &mut self.fear_of_vulnerability,
            &mut self.need_for_control,
            &mut self.emotional_awareness,
            &mut self.empathy,
            &mut self.authenticity,
        ] {
            *t = t.clamp(TRAIT_MIN, TRAIT_MAX);
        }
    }

    /// Whether every trait lies inside its clamp range.
    #[must_use]
    pub fn in_range(&self) -> bool {
        [
            self.pride,
            self.fear_of_vulnerability,
            self.need_for_control,
            self.emotional_awareness,
            self.empathy,
            self.authenticity,
        ]
        .iter()
        .all(|v| (TRAIT_MIN..=TRAIT_MAX).contains(v))
    }
}

/// Patterns the character is not aware of. Never surfaced in guidance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnconsciousPatterns {
    /// Low connection triggers exposure and lowers safety.
    pub fear_of_abandonment: f32,
    /// Drives compensation.
    pub perfectionism: f32,
    /// Self-worth tied to achievement and status.
    pub self_worth_contingency: f32,
}

impl Default for UnconsciousPatterns {
    fn default() -> Self {
        Self {
            fear_of_abandonment: 0.6,
            perfectionism: 0.8,
            self_worth_contingency: 0.7,
        }
    }
}

impl UnconsciousPatterns {
    /// Clamp every pattern to `[TRAIT_MIN, TRAIT_MAX]`.
    pub fn clamp(&mut self) {
        for p in [
            &mut self.fear_of_abandonment,
            &mut self.perfectionism,
            &mut self.self_worth_contingency,
        ] {
            *p = p.clamp(TRAIT_MIN, TRAIT_MAX);
        }
    }

    /// Whether every pattern lies inside its clamp range.
    #[must_use]
    pub fn in_range(&self) -> bool {
        [
            self.fear_of_abandonment,
            self.perfectionism,
            self.self_worth_contingency,
        ]
        .iter()
        .all(|v| (TRAIT_MIN..=TRAIT_MAX).contains(v))
    }
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// Relationship scalars toward the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelationshipState {
    /// How much connection is needed before intimacy grows. `[0.1, 0.9]`.
    pub trust_threshold: f32,
    /// Accumulated closeness. `[0, 1]`.
    pub intimacy_level: f32,
    /// Emotional distance kept from the user. `[0.1, 1]`.
    pub psychological_distance: f32,
}

impl Default for RelationshipState {
    fn default() -> Self {
        Self {
            trust_threshold: 0.5,
            intimacy_level: 0.1,
            psychological_distance: 0.9,
        }
    }
}

impl RelationshipState {
    /// Clamp each scalar to its documented range.
    pub fn clamp(&mut self) {
        self.trust_threshold = self.trust_threshold.clamp(0.1, 0.9);
        self.intimacy_level = self.intimacy_level.clamp(0.0, 1.0);
        self.psychological_distance = self.psychological_distance.clamp(0.1, 1.0);
    }

    /// Whether each scalar lies in its documented range.
    #[must_use]
    pub fn in_range(&self) -> bool {
        (0.1..=0.9).contains(&self.trust_threshold)
            && (0.0..=1.0).contains(&self.intimacy_level)
            && (0.1..=1.0).contains(&self.psychological_distance)
    }
}

// ---------------------------------------------------------------------------
// Context flags
// ---------------------------------------------------------------------------

/// Whether the current scene happens somewhere private.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Anywhere other than the character's residence.
    #[default]
    Public,
    /// The character's own residence.
    Private,
}

/// Coarse per-turn situation flags handed to [`crate::EmotionalCore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFlags {
    /// Public or private setting.
    pub location: LocationKind,
    /// A recent memory mentions a failure.
    pub recent_failure: bool,
    /// The message mentions a crisis keyword.
    pub high_impact_event: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_intense_prefers_furthest_from_midpoint() {
        let e = EmotionDimensions {
            vulnerability: 0.5,
            connection: 0.05,
            autonomy: 0.9,
            validation: 0.5,
            authenticity: 0.5,
            psychological_safety: 0.5,
        };
        assert_eq!(e.most_intense(), EmotionDimension::Connection);
    }

    #[test]
    fn most_intense_ties_resolve_to_first_dimension() {
        let e = EmotionDimensions {
            vulnerability: 0.9,
            connection: 0.1,
            autonomy: 0.5,
            validation: 0.5,
            authenticity: 0.5,
            psychological_safety: 0.5,
        };
        assert_eq!(e.most_intense(), EmotionDimension::Vulnerability);
    }

    #[test]
    fn impact_intensity_and_significant_entries() {
        let mut impact = EmotionImpact::default();
        impact.add(EmotionDimension::Connection, 0.3);
        impact.add(EmotionDimension::Autonomy, -0.2);
        impact.add(EmotionDimension::Validation, 0.05);
        assert!((impact.intensity() - 0.55).abs() < 1e-6);
        let sig = impact.significant_entries();
        assert_eq!(sig.len(), 2);
        assert_eq!(sig[0].0, EmotionDimension::Connection);
        assert_eq!(sig[1].0, EmotionDimension::Autonomy);
    }

    #[test]
    fn clamps_keep_ranges() {
        let mut r = RelationshipState {
            trust_threshold: 2.0,
            intimacy_level: -1.0,
            psychological_distance: 0.0,
        };
        r.clamp();
        assert!(r.in_range());

        let mut p = PersonalityTraits {
            pride: 1.5,
            ..Default::default()
        };
        p.clamp();
        assert!((p.pride - TRAIT_MAX).abs() < f32::EPSILON);
        assert!(p.in_range());
    }
}

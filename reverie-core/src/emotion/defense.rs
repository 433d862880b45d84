//! Defense mechanisms and the internal → expressed transform.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{EmotionDimension, EmotionDimensions, PersonalityTraits, UnconsciousPatterns};

/// The kinds of psychological defense the character can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseKind {
    /// Shows the opposite of what is felt.
    ReactionFormation,
    /// Retreats into facts and logic.
    Intellectualization,
    /// Attributes own powerlessness to others.
    Projection,
    /// Emphasises achievements to mask insecurity.
    Compensation,
}

impl DefenseKind {
    /// Snake-case identifier used in prompts and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReactionFormation => "reaction_formation",
            Self::Intellectualization => "intellectualization",
            Self::Projection => "projection",
            Self::Compensation => "compensation",
        }
    }

    /// Short description of the behaviour this defense produces.
    #[must_use]
    pub fn behavior(self) -> &'static str {
        match self {
            Self::ReactionFormation => {
                "Shows opposite emotion (e.g., vulnerability becomes arrogance)"
            }
            Self::Intellectualization => "Focuses on facts/logic instead of feelings",
            Self::Projection => "Attributes own feelings of powerlessness to others",
            Self::Compensation => "Emphasizes achievements to mask insecurities",
        }
    }

    /// The dimension this defense primarily acts on.
    #[must_use]
    pub fn default_target(self) -> EmotionDimension {
        match self {
            Self::ReactionFormation | Self::Intellectualization => EmotionDimension::Vulnerability,
            Self::Projection => EmotionDimension::Autonomy,
            Self::Compensation => EmotionDimension::Validation,
        }
    }
}

impl fmt::Display for DefenseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active defense for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Defense {
    /// Which defense.
    pub kind: DefenseKind,
    /// Strength in `[0, 1]`.
    pub strength: f32,
    /// Dimension the defense acts on.
    pub target: EmotionDimension,
}

impl Defense {
    fn new(kind: DefenseKind, strength: f32) -> Self {
        Self {
            kind,
            strength: strength.min(1.0),
            target: kind.default_target(),
        }
    }
}

/// Decide which defenses are active given the current internal state.
///
/// The vulnerability-gated defenses are added in a fixed order; projection
/// is checked independently.
#[must_use]
pub fn evaluate(
    internal: &EmotionDimensions,
    personality: &PersonalityTraits,
    unconscious: &UnconsciousPatterns,
    activation: f32,
) -> Vec<Defense> {
    let mut defenses = Vec::new();

    if internal.vulnerability > activation {
        if personality.pride > 0.6 {
            defenses.push(Defense::new(
                DefenseKind::ReactionFormation,
                personality.pride * 0.8,
            ));
        }
        if personality.fear_of_vulnerability > 0.5 {
            defenses.push(Defense::new(
                DefenseKind::Intellectualization,
                personality.fear_of_vulnerability * 0.9,
            ));
        }
        if unconscious.perfectionism > 0.7 {
            defenses.push(Defense::new(
                DefenseKind::Compensation,
                unconscious.perfectionism * 0.7,
            ));
        }
    }

    if internal.autonomy < 0.3 {
        defenses.push(Defense::new(
            DefenseKind::Projection,
            (0.3 - internal.autonomy) * 2.0,
        ));
    }

    defenses
}

/// Derive the expressed vector from the internal one.
///
/// Defenses apply in order, then pride dampens shown vulnerability, then
/// the awareness drift pulls expression part of the way back toward what is
/// felt. The result is clamped to `[0, 1]`.
#[must_use]
pub fn express(
    internal: &EmotionDimensions,
    defenses: &[Defense],
    personality: &PersonalityTraits,
) -> EmotionDimensions {
    let mut expressed = *internal;

    for defense in defenses {
        match defense.kind {
            DefenseKind::ReactionFormation => {
                let target = expressed.get_mut(defense.target);
                *target = (0.2 - internal.get(defense.target) * defense.strength).max(0.0);
                expressed.autonomy = (internal.autonomy + defense.strength * 0.4).min(1.0);
            }
            DefenseKind::Intellectualization => {
                let keep = 1.0 - defense.strength * 0.5;
                for d in EmotionDimension::ALL {
                    *expressed.get_mut(d) *= keep;
                }
                expressed.authenticity *= 1.0 - defense.strength * 0.7;
            }
            // Shapes what is said, not what is shown.
            DefenseKind::Projection => {}
            DefenseKind::Compensation => {
                expressed.validation = (0.7 + defense.strength * 0.3).min(1.0);
                expressed.autonomy = (0.6 + defense.strength * 0.4).min(1.0);
            }
        }
    }

    if personality.pride > 0.6 {
        expressed.vulnerability *= 1.0 - personality.pride * 0.5;
    }

    let awareness_gap = 1.0 - personality.emotional_awareness;
    for d in EmotionDimension::ALL {
        let drift = (internal.get(d) - expressed.get(d)) * awareness_gap * 0.3;
        *expressed.get_mut(d) += drift;
    }

    expressed.clamp_unit();
    expressed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exposed() -> EmotionDimensions {
        EmotionDimensions {
            vulnerability: 0.85,
            ..EmotionDimensions::default()
        }
    }

    #[test]
    fn high_vulnerability_raises_gated_defenses_in_order() {
        let defenses = evaluate(
            &exposed(),
            &PersonalityTraits::default(),
            &UnconsciousPatterns::default(),
            0.7,
        );
        let kinds: Vec<_> = defenses.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DefenseKind::ReactionFormation,
                DefenseKind::Intellectualization,
                DefenseKind::Compensation,
            ]
        );
        assert!((defenses[0].strength - 0.64).abs() < 1e-5);
    }

    #[test]
    fn projection_fires_without_vulnerability() {
        let internal = EmotionDimensions {
            autonomy: 0.1,
            ..EmotionDimensions::default()
        };
        let defenses = evaluate(
            &internal,
            &PersonalityTraits::default(),
            &UnconsciousPatterns::default(),
            0.7,
        );
        assert_eq!(defenses.len(), 1);
        assert_eq!(defenses[0].kind, DefenseKind::Projection);
        assert_eq!(defenses[0].target, EmotionDimension::Autonomy);
        assert!((defenses[0].strength - 0.4).abs() < 1e-5);
    }

    #[test]
    fn reaction_formation_hides_vulnerability() {
        let internal = exposed();
        let personality = PersonalityTraits::default();
        let defenses = evaluate(&internal, &personality, &UnconsciousPatterns::default(), 0.7);
        let expressed = express(&internal, &defenses, &personality);
        assert!(expressed.vulnerability < internal.vulnerability);
        assert!(expressed.is_unit());
    }

    #[test]
    fn no_defenses_still_drifts_toward_internal() {
        let internal = EmotionDimensions::default();
        let personality = PersonalityTraits {
            pride: 0.5,
            ..PersonalityTraits::default()
        };
        let expressed = express(&internal, &[], &personality);
        assert_eq!(expressed, internal);
    }
}

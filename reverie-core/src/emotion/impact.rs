//! Keyword-driven impact analysis.
//!
//! Matching is plain substring search over the lowercased message. Per-word
//! tables add their delta once for every listed keyword found; the
//! any-of tables add their delta once if at least one keyword is present.

use crate::types::{EmotionDimension, EmotionImpact};

/// A per-keyword rule: every matching keyword contributes all `effects`.
struct KeywordRule {
    keywords: &'static [&'static str],
    effects: &'static [(EmotionDimension, f32)],
}

/// An any-of rule: contributes `delta` once if any keyword matches.
struct AnyOfRule {
    keywords: &'static [&'static str],
    dimension: EmotionDimension,
    delta: f32,
}

const PER_KEYWORD: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["understand", "trust", "feel", "open", "sorry", "care"],
        effects: &[
            (EmotionDimension::Vulnerability, 0.15),
            (EmotionDimension::PsychologicalSafety, 0.1),
        ],
    },
    KeywordRule {
        keywords: &["whatever", "obviously", "stupid", "stop"],
        effects: &[
            (EmotionDimension::Vulnerability, -0.1),
            (EmotionDimension::PsychologicalSafety, -0.05),
        ],
    },
    KeywordRule {
        keywords: &["together", "we", "us", "friend", "help"],
        effects: &[(EmotionDimension::Connection, 0.15)],
    },
    KeywordRule {
        keywords: &["alone", "yourself", "your problem"],
        effects: &[(EmotionDimension::Connection, -0.1)],
    },
];

const ANY_OF: &[AnyOfRule] = &[
    AnyOfRule {
        keywords: &["should", "must", "have to"],
        dimension: EmotionDimension::Autonomy,
        delta: -0.2,
    },
    AnyOfRule {
        keywords: &["choice", "decide", "option"],
        dimension: EmotionDimension::Autonomy,
        delta: 0.15,
    },
    AnyOfRule {
        keywords: &["good job", "great", "impressive"],
        dimension: EmotionDimension::Validation,
        delta: 0.25,
    },
    AnyOfRule {
        keywords: &["wrong", "mistake", "messed up"],
        dimension: EmotionDimension::Validation,
        delta: -0.2,
    },
    AnyOfRule {
        keywords: &["real", "honest", "truth"],
        dimension: EmotionDimension::Authenticity,
        delta: 0.2,
    },
    AnyOfRule {
        keywords: &["pretend", "act", "fake"],
        dimension: EmotionDimension::Authenticity,
        delta: -0.15,
    },
];

/// Compute the raw, unclamped impact of `message`.
#[must_use]
pub fn analyze(message: &str) -> EmotionImpact {
    let lowered = message.to_lowercase();
    let mut impact = EmotionImpact::default();

    for rule in PER_KEYWORD {
        for keyword in rule.keywords {
            if lowered.contains(keyword) {
                for &(dimension, delta) in rule.effects {
                    impact.add(dimension, delta);
                }
            }
        }
    }

    for rule in ANY_OF {
        if rule.keywords.iter().any(|k| lowered.contains(k)) {
            impact.add(rule.dimension, rule.delta);
        }
    }

    impact
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn neutral_message_has_no_impact() {
        let impact = analyze("The sky is blue.");
        assert!(close(impact.intensity(), 0.0));
    }

    #[test]
    fn per_keyword_rules_accumulate() {
        // "understand" and "sorry" both count; "together" and "we" both count.
        let impact = analyze("I understand, I'm sorry, we should do this together");
        assert!(close(impact.vulnerability, 0.30));
        assert!(close(impact.psychological_safety, 0.20));
        assert!(close(impact.connection, 0.30));
        assert!(close(impact.autonomy, -0.2));
    }

    #[test]
    fn any_of_rules_fire_once() {
        let impact = analyze("Great, great, GREAT. Impressive work.");
        assert!(close(impact.validation, 0.25));
    }

    #[test]
    fn substring_matching_is_case_insensitive() {
        // "trust" contains "us", so connection moves too.
        let impact = analyze("Thanks for helping, I TRUST you");
        assert!(close(impact.vulnerability, 0.15));
        assert!(close(impact.connection, 0.30));
        assert!(close(impact.psychological_safety, 0.1));
    }

    #[test]
    fn hostile_message_lowers_connection_and_safety() {
        let impact = analyze("Whatever, you're stupid and this is your problem");
        assert!(close(impact.vulnerability, -0.2));
        assert!(close(impact.psychological_safety, -0.1));
        assert!(close(impact.connection, -0.1));
    }
}

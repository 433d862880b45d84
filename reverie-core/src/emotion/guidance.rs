//! Response guidance derived from the post-update emotional state.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::defense::{Defense, DefenseKind};
use crate::types::{EmotionDimension, EmotionDimensions, EmotionImpact, RelationshipState};

/// Maximum number of nonverbal cues in one guidance record.
pub const MAX_CUES: usize = 3;

macro_rules! display_labels {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Human-readable label.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Broad emotional-state labels read from internal emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalStateLabel {
    /// Vulnerable and safe.
    OpeningUp,
    /// Vulnerable but unsafe.
    Exposed,
    /// High connection.
    Connected,
    /// Low connection.
    Isolated,
    /// High autonomy.
    InControl,
    /// Low autonomy.
    Powerless,
    /// High validation.
    Affirmed,
    /// Low validation.
    Invalidated,
    /// High authenticity.
    Authentic,
    /// Low authenticity.
    Inauthentic,
    /// Nothing else fired.
    Neutral,
}

display_labels!(EmotionalStateLabel {
    OpeningUp => "Opening Up",
    Exposed => "Exposed",
    Connected => "Connected",
    Isolated => "Isolated",
    InControl => "In Control",
    Powerless => "Powerless",
    Affirmed => "Affirmed",
    Invalidated => "Invalidated",
    Authentic => "Authentic",
    Inauthentic => "Inauthentic",
    Neutral => "Neutral",
});

/// Overall stance toward the user this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attitude {
    /// Reaction formation is up.
    Dismissive,
    /// Intellectualization is up.
    Analytical,
    /// Projection is up.
    Accusatory,
    /// Compensation is up.
    Boastful,
    /// Withdrawn after a cooling turn.
    Cold,
    /// Stung by invalidation.
    Irritable,
    /// Openly close.
    Warm,
    /// Openly honest.
    Genuine,
    /// Default.
    Guarded,
}

display_labels!(Attitude {
    Dismissive => "Dismissive",
    Analytical => "Analytical",
    Accusatory => "Accusatory",
    Boastful => "Boastful",
    Cold => "Cold",
    Irritable => "Irritable",
    Warm => "Warm",
    Genuine => "Genuine",
    Guarded => "Guarded",
});

/// Verbal tone read from expressed emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Low connection and validation.
    Dismissive,
    /// Protected and in control.
    Condescending,
    /// Connected and open.
    Genuine,
    /// Defenses up.
    Guarded,
    /// Default.
    Neutral,
}

display_labels!(Tone {
    Dismissive => "Dismissive",
    Condescending => "Condescending",
    Genuine => "Genuine",
    Guarded => "Guarded",
    Neutral => "Neutral",
});

/// Relationship dynamic read from relationship scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLabel {
    /// Far and distrustful.
    Hostile,
    /// Far.
    Distant,
    /// Near and intimate.
    Close,
    /// Near.
    Friendly,
    /// In between.
    Neutral,
}

display_labels!(RelationshipLabel {
    Hostile => "Hostile",
    Distant => "Distant",
    Close => "Close",
    Friendly => "Friendly",
    Neutral => "Neutral",
});

/// Everything the dialogue generator needs to voice one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseGuidance {
    /// State labels, never empty.
    pub emotional_state: Vec<EmotionalStateLabel>,
    /// Mean gap between felt and shown emotion.
    pub facade_intensity: f32,
    /// Stance toward the user.
    pub attitude: Attitude,
    /// Mixed feelings, as short descriptions.
    pub emotional_conflicts: Vec<String>,
    /// Up to [`MAX_CUES`] body-language cues.
    pub nonverbal_cues: Vec<String>,
    /// Verbal tone.
    pub tone: Tone,
    /// Relationship dynamic.
    pub relationship: RelationshipLabel,
    /// Active defenses, in activation order.
    pub active_defenses: Vec<DefenseKind>,
    /// Most intensely felt dimension.
    pub internal_feeling: EmotionDimension,
    /// Most intensely shown dimension.
    pub expressed_feeling: EmotionDimension,
}

impl ResponseGuidance {
    /// State labels joined with `", "`.
    #[must_use]
    pub fn state_summary(&self) -> String {
        join_labels(&self.emotional_state)
    }
}

/// Join labels for display.
#[must_use]
pub fn join_labels(labels: &[EmotionalStateLabel]) -> String {
    labels
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// State labels from internal emotions.
#[must_use]
pub fn state_labels(internal: &EmotionDimensions) -> Vec<EmotionalStateLabel> {
    use EmotionalStateLabel as L;

    let mut labels = Vec::new();
    if internal.vulnerability > 0.7 {
        labels.push(if internal.psychological_safety > 0.6 {
            L::OpeningUp
        } else {
            L::Exposed
        });
    }

    let bands = [
        (internal.connection, L::Connected, L::Isolated),
        (internal.autonomy, L::InControl, L::Powerless),
        (internal.validation, L::Affirmed, L::Invalidated),
        (internal.authenticity, L::Authentic, L::Inauthentic),
    ];
    for (value, high, low) in bands {
        if value > 0.7 {
            labels.push(high);
        } else if value < 0.3 {
            labels.push(low);
        }
    }

    if labels.is_empty() {
        labels.push(L::Neutral);
    }
    labels
}

/// Attitude: defense priority first, then expressed-emotion thresholds.
///
/// `Cold` needs the turn to have cooled connection or vulnerability, and
/// `Irritable` needs a validation hit, so a warm message never reads as
/// either even when the baseline is guarded. This gating is intentional and
/// departs from a plain threshold chain; keep it.
#[must_use]
pub fn attitude(
    expressed: &EmotionDimensions,
    defenses: &[Defense],
    impact: &EmotionImpact,
) -> Attitude {
    let has = |kind: DefenseKind| defenses.iter().any(|d| d.kind == kind);
    if has(DefenseKind::ReactionFormation) {
        return Attitude::Dismissive;
    }
    if has(DefenseKind::Intellectualization) {
        return Attitude::Analytical;
    }
    if has(DefenseKind::Projection) {
        return Attitude::Accusatory;
    }
    if has(DefenseKind::Compensation) {
        return Attitude::Boastful;
    }

    let cooling = impact.connection < 0.0 || impact.vulnerability < 0.0;
    if cooling && expressed.vulnerability < 0.3 && expressed.connection < 0.4 {
        return Attitude::Cold;
    }
    if impact.validation < 0.0 && expressed.validation < 0.3 {
        return Attitude::Irritable;
    }
    if expressed.connection > 0.7 {
        return Attitude::Warm;
    }
    if expressed.authenticity > 0.7 {
        return Attitude::Genuine;
    }
    Attitude::Guarded
}

/// Pairwise divergence tests over internal emotions.
#[must_use]
pub fn conflicts(internal: &EmotionDimensions) -> Vec<String> {
    let mut out = Vec::new();

    if (internal.vulnerability - internal.psychological_safety).abs() > 0.4 {
        out.push(if internal.vulnerability > internal.psychological_safety {
            "Wants to open up but doesn't feel safe"
        } else {
            "Feels safe but still guarded"
        });
    }
    if (internal.connection - internal.autonomy).abs() > 0.4 {
        out.push(if internal.connection > internal.autonomy {
            "Drawn to connection but fears losing control"
        } else {
            "Values independence but feels isolated"
        });
    }
    if (internal.authenticity - internal.validation).abs() > 0.4 {
        out.push(if internal.authenticity < internal.validation {
            "Seeking approval at expense of authenticity"
        } else {
            "Being authentic despite potential rejection"
        });
    }

    out.into_iter().map(str::to_owned).collect()
}

/// Nonverbal cues keyed on expressed emotion, plus a pair for a wide
/// felt/shown gap. Truncated to [`MAX_CUES`].
#[must_use]
pub fn nonverbal_cues(internal: &EmotionDimensions, expressed: &EmotionDimensions) -> Vec<String> {
    let mut cues: Vec<&str> = Vec::new();

    if expressed.vulnerability > 0.7 {
        cues.extend(["Softer voice", "Maintains more eye contact"]);
    } else if expressed.vulnerability < 0.3 {
        cues.extend(["Arms crossed", "Chin slightly raised"]);
    }

    if expressed.connection > 0.7 {
        cues.extend(["Leans forward slightly", "More animated expressions"]);
    } else if expressed.connection < 0.3 {
        cues.extend(["Physical distance", "Minimal facial expression"]);
    }

    if expressed.authenticity < 0.3 {
        cues.extend(["Practiced smile", "Controlled movements"]);
    }

    if internal.total_abs_difference(expressed) > 1.0 {
        cues.extend([
            "Slight pause before speaking",
            "Momentary microexpression of true feeling",
        ]);
    }

    cues.into_iter().take(MAX_CUES).map(str::to_owned).collect()
}

/// Tone chain over expressed emotions.
#[must_use]
pub fn tone(expressed: &EmotionDimensions, defenses: &[Defense]) -> Tone {
    if expressed.connection < 0.3 && expressed.validation < 0.4 {
        Tone::Dismissive
    } else if expressed.vulnerability < 0.2 && expressed.autonomy > 0.7 {
        Tone::Condescending
    } else if expressed.connection > 0.6 && expressed.vulnerability > 0.5 {
        Tone::Genuine
    } else if !defenses.is_empty() {
        Tone::Guarded
    } else {
        Tone::Neutral
    }
}

/// Relationship chain over relationship scalars.
#[must_use]
pub fn relationship(state: &RelationshipState) -> RelationshipLabel {
    if state.psychological_distance > 0.7 {
        if state.trust_threshold < 0.3 {
            RelationshipLabel::Hostile
        } else {
            RelationshipLabel::Distant
        }
    } else if state.psychological_distance < 0.4 {
        if state.intimacy_level > 0.6 {
            RelationshipLabel::Close
        } else {
            RelationshipLabel::Friendly
        }
    } else {
        RelationshipLabel::Neutral
    }
}

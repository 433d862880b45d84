//! Reply generation from a fused turn context.
//!
//! The generator renders the prompt, rotates overused nonverbal cues, asks
//! the model for a reply and falls back to a local template reply on any
//! model failure. It carries only variety bookkeeping; everything affective
//! lives in the core.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reverie_core::FusedContext;
use reverie_core::config::LlmConfig;
use reverie_core::emotion::{Attitude, EmotionalStateLabel as S, ResponseGuidance, Tone};
use reverie_llm::prompt::{self, list_or_none};
use reverie_llm::{LlmBackend, LlmError, LlmRequest};
use serde::Serialize;
use tracing::{debug, info, warn};

/// How many recent cues are remembered.
const RECENT_CUE_CAPACITY: usize = 3;
/// A cue used within this many messages is on cooldown.
const CUE_COOLDOWN_MESSAGES: u64 = 3;
/// Used when neither the table nor the model can supply a fresh cue.
const FALLBACK_CUES: [&str; 2] = ["Adjusts her posture", "Looks away briefly"];
/// Separator between memory entries in the prompt.
const MEMORY_SEPARATOR: &str = " | ";

// ---------------------------------------------------------------------------
// Variety tables
// ---------------------------------------------------------------------------

struct CueRule {
    cue: &'static str,
    alternatives: &'static [&'static str],
    /// States in which the cue may repeat despite the cooldown.
    reuse_in: &'static [S],
}

const CUE_RULES: &[CueRule] = &[
    CueRule {
        cue: "Arms crossed",
        alternatives: &[
            "Taps fingers on arm",
            "Shifts weight to one foot",
            "Glances sideways",
            "Huffs softly",
            "Raises an eyebrow",
        ],
        reuse_in: &[S::Neutral, S::Isolated, S::Invalidated],
    },
    CueRule {
        cue: "Chin slightly raised",
        alternatives: &[
            "Tosses her hair back",
            "Looks down her nose",
            "Straightens her posture",
            "Smirks faintly",
        ],
        reuse_in: &[S::InControl],
    },
    CueRule {
        cue: "Leans forward slightly",
        alternatives: &[
            "Nods eagerly",
            "Points for emphasis",
            "Gestures animatedly",
            "Rests chin on hand",
            "Taps pencil on desk",
        ],
        reuse_in: &[S::Neutral, S::Connected, S::Affirmed],
    },
    CueRule {
        cue: "More animated expressions",
        alternatives: &["Laughs lightly", "Eyes light up", "Talks with her hands"],
        reuse_in: &[S::Connected, S::Affirmed],
    },
    CueRule {
        cue: "Physical distance",
        alternatives: &[
            "Scoots her chair back",
            "Turns slightly away",
            "Keeps the desk between them",
        ],
        reuse_in: &[S::Isolated],
    },
    CueRule {
        cue: "Minimal facial expression",
        alternatives: &[
            "Keeps her face blank",
            "Stares at her notes",
            "Answers without looking up",
        ],
        reuse_in: &[S::Isolated, S::Neutral],
    },
    CueRule {
        cue: "Practiced smile",
        alternatives: &["Flashes a polite smile", "Tilts her head", "Laughs a little too brightly"],
        reuse_in: &[S::Inauthentic],
    },
    CueRule {
        cue: "Controlled movements",
        alternatives: &["Smooths her skirt", "Aligns her pens neatly", "Folds her hands"],
        reuse_in: &[S::Inauthentic, S::InControl],
    },
    CueRule {
        cue: "Softer voice",
        alternatives: &[
            "Lowers her gaze",
            "Smiles faintly",
            "Tilts her head gently",
            "Brushes hair back",
            "Relaxes her shoulders",
        ],
        reuse_in: &[S::Connected, S::Authentic, S::OpeningUp],
    },
    CueRule {
        cue: "Maintains more eye contact",
        alternatives: &[
            "Nods slowly",
            "Leans in closer",
            "Holds gaze steadily",
            "Blinks softly",
            "Smirks lightly",
        ],
        reuse_in: &[S::Connected, S::Authentic, S::InControl],
    },
    CueRule {
        cue: "Slight pause before speaking",
        alternatives: &["Opens her mouth, then closes it", "Swallows hard", "Hesitates"],
        reuse_in: &[S::Exposed],
    },
    CueRule {
        cue: "Momentary microexpression of true feeling",
        alternatives: &[
            "Her smile falters for a second",
            "Something flickers across her face",
            "Her jaw tightens briefly",
        ],
        reuse_in: &[S::Exposed, S::OpeningUp],
    },
];

struct PhraseRule {
    phrase: &'static str,
    alternatives: &'static [&'static str],
}

const PHRASE_RULES: &[PhraseRule] = &[
    PhraseRule {
        phrase: "not making a coherent argument",
        alternatives: &[
            "Your logic's all over the place",
            "That doesn't add up at all",
            "You're not making any sense",
            "What are you even getting at?",
        ],
    },
    PhraseRule {
        phrase: "play the victim card",
        alternatives: &[
            "Always acting like the underdog",
            "Stop painting yourself as the hero",
            "Quit dodging responsibility",
            "Don't pull that pity act",
        ],
    },
    PhraseRule {
        phrase: "you're really making this difficult",
        alternatives: &[
            "This is harder than it needs to be",
            "You're complicating everything",
            "Why make this such a hassle?",
            "You're turning this into a mess",
        ],
    },
];

fn cue_rule(cue: &str) -> Option<&'static CueRule> {
    CUE_RULES.iter().find(|r| r.cue.eq_ignore_ascii_case(cue))
}

/// Lowercase and fold typographic apostrophes so phrase matching works on
/// either spelling.
fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The language model answered.
    Model,
    /// The local template reply was used.
    Fallback,
}

/// One generated reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedReply {
    /// Raw text, action and dialogue together.
    pub full_text: String,
    /// Spoken part only.
    pub dialogue: String,
    /// Nonverbal cues requested for this reply, after rotation.
    pub cues: Vec<String>,
    /// Model or fallback.
    pub source: ReplySource,
}

/// Spoken part of a reply: the text between the first and last single quote
/// when the reply has both an action (`*`) and a quote, else the whole text.
#[must_use]
pub fn extract_dialogue(text: &str) -> String {
    if !(text.contains('*') && text.contains('\'')) {
        return text.to_owned();
    }
    let Some(first) = text.find('\'') else {
        return text.to_owned();
    };
    let after = &text[first + 1..];
    let inner = after.rfind('\'').map_or(after, |last| &after[..last]);
    inner.trim().to_owned()
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Turns a [`FusedContext`] into a reply through an [`LlmBackend`].
#[derive(Debug)]
pub struct DialogueGenerator<B> {
    backend: B,
    message_count: u64,
    used_phrases: BTreeSet<&'static str>,
    recent_cues: VecDeque<(String, u64)>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    rng: StdRng,
}

impl<B: LlmBackend> DialogueGenerator<B> {
    /// Generator with sampling settings from `config`.
    pub fn new(backend: B, config: &LlmConfig) -> Self {
        Self {
            backend,
            message_count: 0,
            used_phrases: BTreeSet::new(),
            recent_cues: VecDeque::with_capacity(RECENT_CUE_CAPACITY + 1),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_millis(config.request_timeout_ms),
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for alternative selection.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Replies generated so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Overused phrases seen so far.
    pub fn used_phrases(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.used_phrases.iter().copied()
    }

    /// Cues emitted recently, with the message number they were used at.
    pub fn recent_cues(&self) -> impl Iterator<Item = (&str, u64)> {
        self.recent_cues.iter().map(|(c, n)| (c.as_str(), *n))
    }

    /// Produce the reply for one turn. Never fails: model errors and
    /// timeouts yield the local fallback.
    pub async fn generate(&mut self, ctx: &FusedContext) -> GeneratedReply {
        self.message_count += 1;
        self.scan_earlier_responses(ctx);

        let cues = self.rotate_cues(&ctx.guidance).await;
        let request = self.reply_request(ctx, &cues);

        let model_text = if self.backend.is_available() {
            match self.call_model(&request).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(error = %e, "Reply generation failed, using fallback");
                    None
                }
            }
        } else {
            debug!("No model available, using fallback");
            None
        };

        let (full_text, source) = match model_text {
            Some(text) => (text, ReplySource::Model),
            None => (fallback_reply(ctx, &cues), ReplySource::Fallback),
        };

        self.record_phrases(&full_text);
        for cue in &cues {
            self.recent_cues.push_back((cue.clone(), self.message_count));
            while self.recent_cues.len() > RECENT_CUE_CAPACITY {
                self.recent_cues.pop_front();
            }
        }

        info!(message = self.message_count, ?source, cues = cues.len(), "Reply generated");
        GeneratedReply {
            dialogue: extract_dialogue(&full_text),
            full_text,
            cues,
            source,
        }
    }

    async fn call_model(&self, request: &LlmRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.backend.complete(request)).await {
            Ok(Ok(response)) => Ok(response.text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LlmError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Remember overused phrases the character already said this scene.
    fn scan_earlier_responses(&mut self, ctx: &FusedContext) {
        let marker = format!("{} responded:", ctx.character_name);
        for event in &ctx.dynamic_memory {
            if let Some((_, response)) = event.split_once(&marker) {
                self.record_phrases(response);
            }
        }
    }

    fn record_phrases(&mut self, text: &str) {
        let text = normalize(text);
        for rule in PHRASE_RULES {
            if text.contains(rule.phrase) && self.used_phrases.insert(rule.phrase) {
                debug!(phrase = rule.phrase, "Marked phrase as used");
            }
        }
    }

    /// Replace cues that are on cooldown, unless the current state permits
    /// the repeat.
    async fn rotate_cues(&mut self, guidance: &ResponseGuidance) -> Vec<String> {
        let mut out = Vec::with_capacity(guidance.nonverbal_cues.len());
        for cue in &guidance.nonverbal_cues {
            let recent = self.recent_cues.iter().find(|(c, _)| c.eq_ignore_ascii_case(cue));
            let on_cooldown = recent.is_some_and(|(_, used_at)| {
                self.message_count - used_at <= CUE_COOLDOWN_MESSAGES
                    && !cue_rule(cue).is_some_and(|rule| {
                        rule.reuse_in
                            .iter()
                            .any(|s| guidance.emotional_state.contains(s))
                    })
            });
            if !on_cooldown {
                out.push(cue.clone());
                continue;
            }

            let unused: Vec<&str> = cue_rule(cue)
                .map(|rule| rule.alternatives)
                .unwrap_or_default()
                .iter()
                .copied()
                .filter(|alt| !self.is_recent(alt) && !out.iter().any(|o| o == alt))
                .collect();
            let replacement = match unused.choose(&mut self.rng) {
                Some(alt) => (*alt).to_owned(),
                None => self.fresh_cue(guidance).await,
            };
            debug!(%cue, %replacement, "Rotated nonverbal cue");
            out.push(replacement);
        }
        out
    }

    fn is_recent(&self, cue: &str) -> bool {
        self.recent_cues.iter().any(|(c, _)| c.eq_ignore_ascii_case(cue))
    }

    async fn fresh_cue(&mut self, guidance: &ResponseGuidance) -> String {
        let recent: Vec<&str> = self.recent_cues.iter().map(|(c, _)| c.as_str()).collect();
        let state: Vec<&str> = guidance.emotional_state.iter().map(|s| s.as_str()).collect();
        let text = prompt::render_template(
            prompt::NONVERBAL_CUE,
            &[
                ("emotional_state", &state.join(", ")),
                ("attitude", &guidance.attitude.as_str().to_lowercase()),
                ("recent_cues", &list_or_none(&recent)),
            ],
        );
        let request = LlmRequest::cue(text);

        let generated = if self.backend.is_available() {
            self.call_model(&request).await.ok()
        } else {
            None
        };
        let cleaned = generated
            .as_deref()
            .and_then(|t| t.lines().next())
            .map(|line| line.trim().trim_matches(['*', '\'', '"']).trim().to_owned())
            .filter(|line| !line.is_empty());

        match cleaned {
            Some(cue) => {
                info!(%cue, "Generated fresh nonverbal cue");
                cue
            }
            None => FALLBACK_CUES
                .choose(&mut self.rng)
                .map_or(FALLBACK_CUES[0], |c| *c)
                .to_owned(),
        }
    }

    fn reply_request(&mut self, ctx: &FusedContext, cues: &[String]) -> LlmRequest {
        let g = &ctx.guidance;
        let used: Vec<&str> = self.used_phrases.iter().copied().collect();
        let fresh: Vec<&str> = used
            .iter()
            .filter_map(|p| {
                PHRASE_RULES
                    .iter()
                    .find(|r| r.phrase == *p)
                    .and_then(|r| r.alternatives.choose(&mut self.rng).copied())
            })
            .collect();

        let state = g
            .emotional_state
            .iter()
            .map(|s| s.as_str().to_lowercase())
            .collect::<Vec<_>>()
            .join(", ");
        let defenses: Vec<&str> = g.active_defenses.iter().map(|d| d.as_str()).collect();
        let facade = format!("{:.2}", g.facade_intensity);
        let attitude = g.attitude.as_str().to_lowercase();
        let tone = g.tone.as_str().to_lowercase();
        let relationship = g.relationship.as_str().to_lowercase();
        let action = ctx.action.to_lowercase();

        let system = prompt::render_template(
            prompt::ROLEPLAY_SYSTEM,
            &[("character_name", &ctx.character_name)],
        );
        let user = prompt::render_template(
            prompt::ROLEPLAY_USER,
            &[
                ("character_name", &ctx.character_name),
                ("personality", &ctx.personality),
                ("current_time", &ctx.current_time),
                ("location", &ctx.location),
                ("action", &action),
                ("emotional_state", &state),
                ("internal_feeling", g.internal_feeling.as_str()),
                ("expressed_feeling", g.expressed_feeling.as_str()),
                ("facade_intensity", &facade),
                ("attitude", &attitude),
                ("emotional_conflicts", &list_or_none(&g.emotional_conflicts)),
                ("tone", &tone),
                ("nonverbal_cues", &list_or_none(cues)),
                ("active_defenses", &list_or_none(&defenses)),
                ("base_relationship", &ctx.relationship_with_user),
                ("relationship", &relationship),
                ("previous_action", ctx.previous_action.as_deref().unwrap_or(prompt::NONE)),
                ("dynamic_memory", &join_memories(&ctx.dynamic_memory)),
                ("active_memory", &join_memories(&ctx.active_memory)),
                ("long_term_memory", &join_memories(&ctx.long_term_memory)),
                ("user_memories", &join_memories(&ctx.user_memories)),
                ("avoided_phrases", &list_or_none(&used)),
                ("fresh_phrases", &list_or_none(&fresh)),
                ("user_name", &ctx.user_name),
                ("user_input", &ctx.user_input),
            ],
        );

        LlmRequest::dialogue(system, user)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
    }
}

fn join_memories(items: &[String]) -> String {
    if items.is_empty() {
        prompt::NONE.to_owned()
    } else {
        items.join(MEMORY_SEPARATOR)
    }
}

/// Local reply used when the model is unavailable: the cues as an action
/// line, then an attitude-specific line of dialogue.
#[must_use]
pub fn fallback_reply(ctx: &FusedContext, cues: &[String]) -> String {
    let user = &ctx.user_name;
    let action = if cues.is_empty() {
        format!("*{} hesitates.*", ctx.character_name)
    } else {
        let first = cues[0].to_lowercase();
        let rest: Vec<String> = cues[1..].iter().map(|c| c.to_lowercase()).collect();
        let mut line = format!("*{} {first}", ctx.character_name);
        for cue in rest {
            line.push_str(", ");
            line.push_str(&cue);
        }
        line.push_str(".*");
        line
    };

    let dialogue = match (ctx.guidance.attitude, ctx.guidance.tone) {
        (Attitude::Dismissive, Tone::Condescending) => format!(
            "'Seriously, {user}? You're making a big deal out of nothing. Get over it.'"
        ),
        (Attitude::Dismissive, _) => format!("'Whatever, {user}. It's not a big deal.'"),
        (Attitude::Cold, _) => format!("'Fine, {user}. Let's just get this over with.'"),
        (Attitude::Irritable, _) => format!("'Can you not, {user}? I'm really not in the mood.'"),
        (Attitude::Analytical, _) => format!(
            "'Let's look at this logically, {user}. Feelings aside, what's the actual plan?'"
        ),
        (Attitude::Accusatory, _) => format!("'This is on you, {user}. Not me.'"),
        (Attitude::Boastful, _) => format!("'Relax, {user}. I've got this handled, obviously.'"),
        (Attitude::Warm, _) => format!("'Hey, {user}... I'm actually glad you're here.'"),
        (Attitude::Genuine, _) => {
            format!("'Honestly, {user}? I don't really know how I feel about this.'")
        }
        (Attitude::Guarded, _) => {
            format!("'I don't know what to say, {user}. Can we just move on?'")
        }
    };

    format!("{action}\n\n{dialogue}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::{ContextAssembler, ReverieConfig};
    use reverie_llm::ScriptedBackend;

    fn context(input: &str) -> FusedContext {
        ContextAssembler::new(&ReverieConfig::default()).construct_context(input)
    }

    fn generator(backend: ScriptedBackend) -> DialogueGenerator<ScriptedBackend> {
        DialogueGenerator::new(backend, &LlmConfig::default()).with_seed(7)
    }

    #[test]
    fn dialogue_is_cut_from_quotes() {
        assert_eq!(
            extract_dialogue("*rolls her eyes* 'Fine. Whatever.'"),
            "Fine. Whatever."
        );
        assert_eq!(
            extract_dialogue("*smirks* 'You're late, aren't you?'"),
            "You're late, aren't you?"
        );
        assert_eq!(extract_dialogue("Just words, no action."), "Just words, no action.");
        assert_eq!(extract_dialogue("'No action here.'"), "'No action here.'");
    }

    #[test]
    fn fallback_lists_cues_then_speaks() {
        let mut ctx = context("Hi");
        ctx.guidance.attitude = Attitude::Dismissive;
        ctx.guidance.tone = Tone::Condescending;
        let text = fallback_reply(&ctx, &["Arms crossed".into(), "Chin slightly raised".into()]);
        assert!(text.starts_with("*Poppy arms crossed, chin slightly raised.*"));
        assert!(text.contains("Seriously, Lin?"));
        assert_eq!(
            extract_dialogue(&text),
            "Seriously, Lin? You're making a big deal out of nothing. Get over it."
        );
    }

    #[tokio::test]
    async fn model_reply_is_used_verbatim() {
        let backend = ScriptedBackend::new().with_reply("*taps her pen* 'Start talking.'");
        let mut g = generator(backend);
        let reply = g.generate(&context("Sorry about yesterday.")).await;

        assert_eq!(reply.source, ReplySource::Model);
        assert_eq!(reply.full_text, "*taps her pen* 'Start talking.'");
        assert_eq!(reply.dialogue, "Start talking.");

        let sent = g.backend().requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].system.contains("You are Poppy"));
        assert!(sent[0].user.contains("Lin just said: 'Sorry about yesterday.'"));
        assert_eq!(sent[0].max_tokens, LlmConfig::default().max_tokens);
    }

    #[tokio::test]
    async fn model_error_falls_back() {
        let backend = ScriptedBackend::new().with_error(LlmError::Unavailable("down".into()));
        let mut g = generator(backend);
        let reply = g.generate(&context("Hi")).await;
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(reply.full_text.starts_with("*Poppy"));
    }

    #[tokio::test]
    async fn unavailable_backend_is_never_called() {
        let mut g = generator(ScriptedBackend::unavailable());
        let reply = g.generate(&context("Hi")).await;
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(g.backend().requests().is_empty());
        assert_eq!(g.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out_into_fallback() {
        let backend = ScriptedBackend::new()
            .with_reply("*too late*")
            .with_delay(Duration::from_secs(120));
        let mut g = generator(backend);
        let reply = g.generate(&context("Hi")).await;
        assert_eq!(reply.source, ReplySource::Fallback);
    }

    #[tokio::test]
    async fn overused_phrases_are_tracked_and_avoided() {
        let backend = ScriptedBackend::new()
            .with_reply("*scoffs* 'Don\u{2019}t PLAY THE VICTIM CARD with me.'")
            .with_reply("*sighs* 'Fine.'");
        let mut g = generator(backend);

        g.generate(&context("It wasn't my fault")).await;
        assert_eq!(g.used_phrases().collect::<Vec<_>>(), vec!["play the victim card"]);

        g.generate(&context("Really")).await;
        let sent = g.backend().requests();
        assert!(sent[1].user.contains("play the victim card"));
    }

    #[tokio::test]
    async fn repeated_cue_is_rotated_unless_state_allows_it() {
        let mut g = generator(ScriptedBackend::unavailable());
        let mut ctx = context("Hi");
        ctx.guidance.nonverbal_cues = vec!["Arms crossed".into()];
        ctx.guidance.emotional_state = vec![S::Connected];

        let first = g.generate(&ctx).await;
        assert_eq!(first.cues, vec!["Arms crossed".to_owned()]);

        let second = g.generate(&ctx).await;
        let rule = cue_rule("Arms crossed").expect("rule");
        assert_ne!(second.cues[0], "Arms crossed");
        assert!(rule.alternatives.contains(&second.cues[0].as_str()));

        ctx.guidance.emotional_state = vec![S::Isolated];
        let third = g.generate(&ctx).await;
        assert_eq!(third.cues, vec!["Arms crossed".to_owned()]);
    }

    #[tokio::test]
    async fn recent_cues_are_capped() {
        let mut g = generator(ScriptedBackend::unavailable());
        let mut ctx = context("Hi");
        ctx.guidance.emotional_state = vec![S::Neutral];
        ctx.guidance.nonverbal_cues = vec![
            "Arms crossed".into(),
            "Minimal facial expression".into(),
            "Physical distance".into(),
        ];
        g.generate(&ctx).await;
        ctx.guidance.nonverbal_cues = vec!["Softer voice".into()];
        g.generate(&ctx).await;

        let recent: Vec<&str> = g.recent_cues().map(|(c, _)| c).collect();
        assert_eq!(recent.len(), RECENT_CUE_CAPACITY);
        assert_eq!(recent.last().copied(), Some("Softer voice"));
    }
}

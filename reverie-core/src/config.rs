//! Configuration for a Reverie session.
//!
//! Maps directly to `reverie.toml`. Every field has a default, so an empty
//! file (or no file) yields the stock character and tuning.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ReverieError, Result};

/// Largest accepted `context.time_scale_factor` (one real second is then
/// almost twelve story days).
pub const MAX_TIME_SCALE_FACTOR: f64 = 1_000_000.0;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverieConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// The roleplayed character.
    #[serde(default)]
    pub character: CharacterConfig,
    /// The human participant.
    #[serde(default)]
    pub user: UserConfig,
    /// Emotion engine tuning.
    #[serde(default)]
    pub emotion: EmotionConfig,
    /// Memory cascade sizes and keyword lists.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Scene inference tables and the roleplay clock.
    #[serde(default)]
    pub context: ContextConfig,
    /// Language-model endpoint.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Save / load settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ReverieConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ReverieError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| ReverieError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    /// Returns `ReverieError::Config` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| -> Result<()> { Err(ReverieError::Config(msg.to_owned())) };

        let unit = 0.0..=1.0;
        if !unit.contains(&self.emotion.emotional_inertia) {
            return bad("emotion.emotional_inertia must be within [0, 1]");
        }
        if !unit.contains(&self.emotion.defense_activation) {
            return bad("emotion.defense_activation must be within [0, 1]");
        }
        if self.memory.max_events == 0 {
            return bad("memory.max_events must be at least 1");
        }
        if self.memory.summary_size == 0 {
            return bad("memory.summary_size must be at least 1");
        }
        if self.memory.active_threshold < self.memory.summary_size {
            return bad("memory.active_threshold must be >= memory.summary_size");
        }
        let scale = self.context.time_scale_factor;
        if !scale.is_finite() || scale <= 0.0 || scale > MAX_TIME_SCALE_FACTOR {
            return bad("context.time_scale_factor must be positive and at most 1e6");
        }
        if self.llm.request_timeout_ms == 0 {
            return bad("llm.request_timeout_ms must be positive");
        }
        match self.persistence.backend.as_str() {
            "json" | "sqlite" | "none" => {}
            _ => return bad("persistence.backend must be one of json, sqlite, none"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Static description of the character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    /// Display name.
    #[serde(default = "default_character_name")]
    pub name: String,
    /// Personality description used in prompts.
    #[serde(default = "default_personality")]
    pub personality: String,
    /// Base relationship label toward the user.
    #[serde(default = "default_character_relationship")]
    pub relationship_with_user: String,
    /// The location treated as private.
    #[serde(default = "default_private_location")]
    pub private_location: String,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            name: default_character_name(),
            personality: default_personality(),
            relationship_with_user: default_character_relationship(),
            private_location: default_private_location(),
        }
    }
}

/// Static description of the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Display name.
    #[serde(default = "default_user_name")]
    pub name: String,
    /// How the user relates to the character.
    #[serde(default = "default_user_relationship")]
    pub relationship_with_character: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            relationship_with_character: default_user_relationship(),
        }
    }
}

/// Emotion engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    /// Share of raw impact that does NOT land each turn.
    #[serde(default = "default_0_7")]
    pub emotional_inertia: f32,
    /// Vulnerability level above which defenses activate.
    #[serde(default = "default_0_7")]
    pub defense_activation: f32,
    /// Carried with the state for future tuning.
    #[serde(default = "default_0_4")]
    pub emotional_volatility: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            emotional_inertia: 0.7,
            defense_activation: 0.7,
            emotional_volatility: 0.4,
        }
    }
}

/// Memory cascade sizes and keyword lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Dynamic-memory capacity.
    #[serde(default = "default_3_usize")]
    pub max_events: usize,
    /// Active-memory compaction threshold.
    #[serde(default = "default_25")]
    pub active_threshold: usize,
    /// Entries produced per compaction.
    #[serde(default = "default_3_usize")]
    pub summary_size: usize,
    /// Active memories surfaced in each turn's context.
    #[serde(default = "default_10")]
    pub active_context_count: usize,
    /// Log a progress line every N active-memory inserts (0 disables).
    #[serde(default = "default_100")]
    pub progress_log_interval: u64,
    /// Keywords that make a dynamic event worth forwarding.
    #[serde(default = "default_relevance_keywords")]
    pub relevance_keywords: Vec<String>,
    /// Keywords that make an active event survive compaction.
    #[serde(default = "default_importance_keywords")]
    pub importance_keywords: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_events: 3,
            active_threshold: 25,
            summary_size: 3,
            active_context_count: 10,
            progress_log_interval: 100,
            relevance_keywords: default_relevance_keywords(),
            importance_keywords: default_importance_keywords(),
        }
    }
}

/// One entry of a keyword → canonical value table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMapping {
    /// Lowercase substring to look for.
    pub keyword: String,
    /// Value to switch to when it matches.
    pub value: String,
}

impl KeywordMapping {
    fn new(keyword: &str, value: &str) -> Self {
        Self {
            keyword: keyword.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Scene inference tables and the roleplay clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Location table, scanned in order; first match wins.
    #[serde(default = "default_locations")]
    pub locations: Vec<KeywordMapping>,
    /// Action table, scanned in order; first match wins.
    #[serde(default = "default_actions")]
    pub actions: Vec<KeywordMapping>,
    /// Words that mark a high-impact message.
    #[serde(default = "default_crisis_keywords")]
    pub crisis_keywords: Vec<String>,
    /// Roleplay clock start.
    #[serde(default = "default_clock_start")]
    pub clock_start: NaiveDateTime,
    /// Story seconds per real second.
    #[serde(default = "default_15_0")]
    pub time_scale_factor: f64,
    /// Minimum story minutes per turn.
    #[serde(default = "default_2_u32")]
    pub min_advance_minutes: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            actions: default_actions(),
            crisis_keywords: default_crisis_keywords(),
            clock_start: default_clock_start(),
            time_scale_factor: 15.0,
            min_advance_minutes: 2,
        }
    }
}

/// Language-model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: `openai_compatible`, `ollama`, `none`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL of the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Hard timeout for a whole generation in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Retries after the first failed attempt.
    #[serde(default = "default_1_u32")]
    pub max_retries: u32,
    /// Token cap for dialogue.
    #[serde(default = "default_500")]
    pub max_tokens: u32,
    /// Sampling temperature for dialogue.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_ms: 30_000,
            max_retries: 1,
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// Save / load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: `json`, `sqlite` or `none`.
    #[serde(default = "default_json")]
    pub backend: String,
    /// Snapshot file (JSON) or database (SQLite) path.
    #[serde(default = "default_save_path")]
    pub path: String,
    /// Store and verify a CRC-32 of each SQLite snapshot.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Use WAL journaling for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Save after every turn.
    #[serde(default = "default_true")]
    pub autosave: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_json(),
            path: default_save_path(),
            checksum_enabled: true,
            wal_mode: true,
            autosave: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_character_name() -> String { "Poppy".to_string() }
fn default_personality() -> String {
    "Proud, competitive and image-conscious; sharp-tongued with people she has not decided to trust".to_string()
}
fn default_character_relationship() -> String { "Rivals".to_string() }
fn default_private_location() -> String { "Poppy's House".to_string() }
fn default_user_name() -> String { "Lin".to_string() }
fn default_user_relationship() -> String { "Project partner".to_string() }
fn default_provider() -> String { "openai_compatible".to_string() }
fn default_base_url() -> String { "https://openrouter.ai/api".to_string() }
fn default_model() -> String { "meta-llama/llama-4-maverick:free".to_string() }
fn default_api_key_env() -> String { "OPENROUTER_API_KEY".to_string() }
fn default_json() -> String { "json".to_string() }
fn default_save_path() -> String { "save_state.json".to_string() }
fn default_0_4() -> f32 { 0.4 }
fn default_0_7() -> f32 { 0.7 }
fn default_15_0() -> f64 { 15.0 }
fn default_1_u32() -> u32 { 1 }
fn default_2_u32() -> u32 { 2 }
fn default_3_usize() -> usize { 3 }
fn default_10() -> usize { 10 }
fn default_25() -> usize { 25 }
fn default_100() -> u64 { 100 }
fn default_500() -> u32 { 500 }
fn default_30000() -> u64 { 30_000 }

fn default_clock_start() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 4, 16)
        .and_then(|d| d.and_hms_opt(14, 0, 0))
        .unwrap_or_default()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn default_relevance_keywords() -> Vec<String> {
    strings(&["hug", "tears", "sorry", "together", "project", "conflict", "emotion"])
}

fn default_importance_keywords() -> Vec<String> {
    strings(&["project", "park", "school", "relationship", "conflict", "emotion", "together"])
}

fn default_crisis_keywords() -> Vec<String> {
    strings(&["die", "death", "gone", "kill", "razor", "cut", "suicide", "depress"])
}

fn default_locations() -> Vec<KeywordMapping> {
    [
        ("house", "Poppy's House"),
        ("park", "Park"),
        ("library", "Library"),
        ("school", "School"),
        ("science class", "Science Class"),
    ]
    .into_iter()
    .map(|(k, v)| KeywordMapping::new(k, v))
    .collect()
}

fn default_actions() -> Vec<KeywordMapping> {
    [
        ("work", "Working on the project"),
        ("continue", "Continuing the project"),
        ("plan", "Planning the project"),
        ("relax", "Relaxing"),
        ("start", "Starting the project"),
    ]
    .into_iter()
    .map(|(k, v)| KeywordMapping::new(k, v))
    .collect()
}

//! # Reverie roleplay runtime
//!
//! Ties the affective core to a language model: [`Session`] owns the
//! [`reverie_core::ContextAssembler`] and a [`DialogueGenerator`], and runs
//! one turn per user message.
//!
//! ```text
//! input ─▶ construct_context ─▶ DialogueGenerator::generate ─▶ manage_dynamic_memory ─▶ autosave
//! ```

#![deny(clippy::unwrap_used)]

pub mod dialogue;
pub mod session;
pub mod telemetry;

pub use dialogue::{DialogueGenerator, GeneratedReply, ReplySource};
pub use session::{Session, TurnOutcome};

//! # Reverie Core Library
//!
//! I/O-free affective engine for a single roleplay character.
//!
//! Every turn flows through three collaborating pieces:
//!
//! - **Emotion**: [`EmotionalCore`] holds internal vs. expressed emotion vectors,
//!   defense mechanisms, relationship scalars, personality drift and an
//!   emotional-memory log with trigger words.
//! - **Memory**: [`MemoryCascade`] runs the Dynamic → Active → Long-term
//!   eviction pipeline that compacts raw turns into durable summaries.
//! - **Context**: [`ContextAssembler`] fuses emotional guidance, memory
//!   snapshots and static profiles into one [`FusedContext`] per turn.
//!
//! Nothing in this crate performs network I/O. The only filesystem access
//! lives in [`persistence`], behind the [`persistence::SnapshotStore`] trait.
//!
//! ## Turn contract
//!
//! One user message produces exactly one emotional update and one memory
//! insertion. State is owned by a single [`ContextAssembler`]; callers that
//! need concurrency must serialise turns themselves.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod context;
pub mod emotion;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod profile;
pub mod types;

pub use config::ReverieConfig;
pub use context::{ContextAssembler, FusedContext};
pub use emotion::{EmotionalCore, ResponseGuidance};
pub use error::ReverieError;
pub use memory::MemoryCascade;
pub use types::*;

//! Nightcap Core Library
//!
//! Shared drink tally: models, SQLite storage, the mutation pipeline, the
//! local session mirror, leader resolution and the roll cooldown.

pub mod cooldown;
pub mod dice;
pub mod error;
pub mod export;
pub mod identity;
pub mod identity_cache;
pub mod invariants;
pub mod leader;
pub mod mirror;
pub mod models;
pub mod pipeline;
pub mod stats;
pub mod storage;
pub mod tracker;

pub use cooldown::{CooldownState, CooldownStatus, ROLL_COOLDOWN};
pub use dice::DiceRoll;
pub use error::{Error, Result};
pub use identity_cache::IdentityCache;
pub use mirror::SessionMirror;
pub use models::*;
pub use stats::UserStats;
pub use storage::{Database, IdentityRepository, SessionRepository, Storage};
pub use tracker::Tracker;

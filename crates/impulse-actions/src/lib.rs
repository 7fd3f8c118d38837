//! Action catalog, probabilistic resolution and lifecycle for the impulse
//! engine.
//!
//! Like `impulse-needs`, this crate is synchronous and lock-free. The
//! engine owns timing, storage and per-agent mutual exclusion; everything
//! here operates on a borrowed [`impulse_needs::NeedBook`] and
//! [`ActionSlot`].
//!
//! # Modules
//!
//! - [`catalog`] -- Action type to defaults table ([`ActionCatalog`])
//! - [`error`] -- Error types for action operations ([`ActionError`])
//! - [`lifecycle`] -- Single-active-action slot and state machine
//! - [`resolver`] -- Resource check, roll, effectiveness and effects
//! - [`roll`] -- Injectable probability sources

pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod resolver;
pub mod roll;

pub use catalog::{ActionCatalog, ActionDefaults};
pub use error::ActionError;
pub use lifecycle::{ActionSlot, HISTORY_LIMIT};
pub use resolver::{ResolutionPolicy, effectiveness, resolve};
pub use roll::{FixedRoll, ROLL_MAX, RollSource, ScriptedRoll, SeededRoll};

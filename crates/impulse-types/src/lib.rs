//! Shared type definitions for the impulse needs-driven action engine.
//!
//! This crate is the single source of truth for the data model shared by
//! the need model, the action resolver and the engine.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for agents, actions and events
//! - [`enums`] -- Need channels, need states, action kinds and statuses
//! - [`structs`] -- Needs, actions, motivations, resolutions and events

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ActionStatus, ActionType, EngineEventKind, FailureReason, NeedState, NeedType};
pub use ids::{ActionId, AgentId, EventId};
pub use structs::{
    CRITICAL_FRUSTRATION, CRITICAL_MULTIPLIER, CharacterAction, EngineEvent, MAX_FRUSTRATION,
    Motivation, Need, PotentialReward, RelatedNeed, Resolution, SideEffect,
};

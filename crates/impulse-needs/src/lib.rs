//! Need model and motivation derivation for the impulse engine.
//!
//! This crate holds the pure, lock-free logic for an agent's drives. It
//! performs no I/O: the engine loads and saves needs through its storage
//! collaborator and serializes access per agent.
//!
//! # Modules
//!
//! - [`book`] -- Per-agent need set with growth, decay, blocking and influence
//! - [`config`] -- Need defaults table and frustration tunables ([`NeedConfig`])
//! - [`error`] -- Error types for need operations ([`NeedError`])
//! - [`motivation`] -- Ranked motivations derived from need state

pub mod book;
pub mod config;
pub mod error;
pub mod motivation;

pub use book::{FrustrationPolicy, NeedBook, TickReport};
pub use config::{NeedConfig, NeedDefaults, default_need_table};
pub use error::NeedError;
pub use motivation::{action_impulse, derive_motivations};

//! Concurrent engine, collaborators and periodic sweep for the impulse
//! needs-driven action engine.
//!
//! This crate wires the pure need and action logic into a running
//! service: one lock per agent, cancellable completion timers, a bounded
//! periodic sweep and an event stream.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait with system and manual implementations
//! - [`config`] -- Configuration loading from `impulse-config.yaml`
//! - [`content`] -- [`ContentGenerator`] trait and template generator
//! - [`engine`] -- [`Engine`]: per-agent registry and action lifecycle
//! - [`error`] -- Collaborator and engine error types
//! - [`events`] -- Broadcast [`EventBus`] for engine events
//! - [`notify`] -- [`Notifier`] trait and log notifier
//! - [`scheduler`] -- Cancellable delayed tasks keyed by action id
//! - [`storage`] -- [`Storage`] trait and in-memory storage
//! - [`sweep`] -- Periodic sweep over all active agents
//!
//! [`Clock`]: clock::Clock
//! [`ContentGenerator`]: content::ContentGenerator
//! [`Engine`]: engine::Engine
//! [`EventBus`]: events::EventBus
//! [`Notifier`]: notify::Notifier
//! [`Storage`]: storage::Storage

pub mod clock;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod events;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig, LogFormat, LoggingConfig, SweepConfig};
pub use content::{ContentGenerator, ContentRequest, TemplateContentGenerator};
pub use engine::{Engine, EngineBuilder};
pub use error::{CollaboratorError, EngineError};
pub use events::{BROADCAST_CAPACITY, EventBus};
pub use notify::{LogNotifier, Notifier};
pub use scheduler::TaskScheduler;
pub use storage::{MemoryStorage, Storage};
pub use sweep::{CycleOutcome, SweepHandle, SweepSummary};

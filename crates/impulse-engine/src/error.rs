//! Error types for the impulse engine binary.
//!
//! [`StartupError`] is the top-level error type that wraps every failure
//! mode between process start and the sweep loop running.

/// Top-level error for the impulse engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: impulse_core::ConfigError,
    },

    /// An engine operation failed during startup.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: impulse_core::EngineError,
    },

    /// Seed agent configuration could not be read.
    #[error("seed error: {message}")]
    Seed {
        /// Description of the seed failure.
        message: String,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

//! Error types for audio-offset-manager
//!
//! The event-handling path never returns errors to the host; failures there
//! surface as `false`/`None` port results and log lines. This type covers
//! lifecycle misuse by the embedder (double start, worker spawn failure).

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Component is not in a state that allows the requested transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A background worker thread could not be spawned
    #[error("Worker thread error: {0}")]
    Worker(#[from] std::io::Error),
}

/// Convenience Result type using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

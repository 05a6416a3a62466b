//! Error types for crewcast-sd

use thiserror::Error;

/// Main error type for the station director
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from the common layer
    #[error(transparent)]
    Common(#[from] crewcast_common::Error),

    /// Engine command was rejected (protocol ACK)
    #[error("Engine command failed: {0}")]
    EngineCommand(String),

    /// Engine connection or handshake failure
    #[error("Engine connection error: {0}")]
    EngineConnection(String),

    /// A staged file never appeared in the engine catalog
    #[error("Staged file never arrived: {0}")]
    StagingTimeout(String),

    /// Scheduler lifecycle misuse
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using crewcast-sd Error
pub type Result<T> = std::result::Result<T, Error>;

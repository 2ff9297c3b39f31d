//! Error types for the mira playback engine

use thiserror::Error;

/// Result type alias for playback operations
pub type MiraResult<T> = Result<T, MiraError>;

/// Errors that can occur in the playback engine
#[derive(Error, Debug)]
pub enum MiraError {
    #[error("Synthesis request failed: {0}")]
    Synth(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Script store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

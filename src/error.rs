use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::caller::WriterId;

/// Why a bounded or cancellable write entry gave up.
///
/// Neither case leaves the reader count touched: the writer never got past
/// the drain wait, and the internal lock is released before returning.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
    #[error("{writer} was cancelled while waiting for exclusive access")]
    Cancelled { writer: WriterId },

    #[error("{writer} gave up after {waited:?} waiting for exclusive access")]
    TimedOut { writer: WriterId, waited: Duration },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("failed to spawn {task}: {source}")]
    Spawn {
        task: String,
        source: std::io::Error,
    },

    #[error("{task} panicked")]
    TaskPanicked { task: String },
}

//! Error types for the overlay settings store.

use std::path::PathBuf;
use thiserror::Error;

/// Settings loading, saving and editing errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to create settings directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read settings file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode settings: {0}")]
    EncodeFailed(String),

    #[error("Unknown setting '{key}', did you mean '{suggestion}'?")]
    UnknownKey { key: String, suggestion: String },

    #[error("Invalid value '{value}' for setting '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Errors raised while reading the sibling tool's credentials file.
#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("Failed to read legacy file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse legacy file '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to watch '{path}': {message}")]
    WatchFailed { path: PathBuf, message: String },

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

//! Error types for the Petling simulation core.
//!
//! This module provides a unified error type for all fallible operations in
//! petling-core: save file and settings I/O, sprite-sheet loading, action
//! parsing, configuration, and driver communication.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for petling-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read the save file from disk.
    #[error("failed to read save file '{path}': {source}")]
    SaveRead {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The save file exists but does not contain a valid pet record.
    #[error("failed to parse save file '{path}': {source}")]
    SaveParse {
        /// The path containing invalid JSON.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the save file to disk.
    #[error("failed to write save file '{path}': {source}")]
    SaveWrite {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read the settings file from disk.
    #[error("failed to read settings file '{path}': {source}")]
    SettingsRead {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("failed to parse settings file '{path}': {source}")]
    SettingsParse {
        /// The path containing invalid JSON.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the settings file to disk.
    #[error("failed to write settings file '{path}': {source}")]
    SettingsWrite {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be turned into JSON for writing.
    #[error("failed to encode '{path}': {source}")]
    Encode {
        /// The file that was about to be written.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A sprite sheet or placeholder image could not be loaded.
    #[error("failed to load sprite sheet '{path}': {message}")]
    SpriteLoad {
        /// The image path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A command name did not match any pet action.
    #[error("unknown action: '{name}'")]
    InvalidAction {
        /// The name that was given.
        name: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem.
        message: String,
    },

    /// The driver or persistence worker is no longer running.
    #[error("channel closed: {what}")]
    ChannelClosed {
        /// Which side went away.
        what: &'static str,
    },

    /// An error that doesn't fit other categories.
    #[error("{message}")]
    Other {
        /// Description of the error.
        message: String,
    },
}

impl Error {
    /// Create a new `SpriteLoad` error for the given path.
    pub fn sprite_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SpriteLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new `ConfigError` with the given message.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new `Other` error with the given message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for petling-core operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Configuration for the Petling runner.
//!
//! This module provides the `Config` struct with a builder pattern for the
//! pet's name, file locations, timer cadences, cooldowns, decay rules, and
//! the parts of [`Settings`] the runner acts on.

use crate::animation::AnimationTable;
use crate::error::{Error, Result};
use crate::pet::{Action, DecayRules, DEFAULT_PET_NAME};
use crate::settings::Settings;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

/// Default save file name.
const SAVE_FILE_NAME: &str = "pet_save.json";

/// Default settings file name.
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Default error log file name.
const ERROR_LOG_FILE_NAME: &str = "error_log.txt";

/// Default directory holding sprite sheets.
const DEFAULT_ASSET_DIR: &str = "assets/images";

/// Default interval between decay updates.
const DEFAULT_TICK_SECS: u64 = 1;

/// Default cooldown after feed, play, and medicine.
const DEFAULT_COOLDOWN_SECS: u64 = 2;

/// Default cooldown after sleep.
const DEFAULT_SLEEP_COOLDOWN_SECS: u64 = 5;

/// Default auto-save interval in minutes.
const DEFAULT_AUTO_SAVE_MINUTES: u64 = 5;

/// Where the pet's files live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub save_file: PathBuf,
    pub settings_file: PathBuf,
    pub error_log: PathBuf,
}

impl DataPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            save_file: dir.join(SAVE_FILE_NAME),
            settings_file: dir.join(SETTINGS_FILE_NAME),
            error_log: dir.join(ERROR_LOG_FILE_NAME),
            data_dir: dir,
        }
    }

    /// Standard file names inside the per-user data directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if no home directory can be found.
    pub fn user_default() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "petling", "Petling")
            .ok_or_else(|| Error::config_error("could not resolve a user data directory"))?;
        Ok(Self::in_dir(dirs.data_local_dir()))
    }
}

/// Configuration for the Petling runner.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name given to a newly hatched pet.
    pub pet_name: String,

    /// Path to the save file.
    pub save_path: PathBuf,

    /// Directory sprite sheets are loaded from.
    pub asset_dir: PathBuf,

    /// Interval between decay updates.
    pub tick_interval: Duration,

    /// Interval between auto-saves. `None` disables auto-save.
    pub auto_save_interval: Option<Duration>,

    /// Cooldown after feed, play, and medicine.
    pub cooldown: Duration,

    /// Cooldown after sleep.
    pub sleep_cooldown: Duration,

    /// Rates and thresholds for decay.
    pub decay: DecayRules,

    /// Animation strip for each state.
    pub animations: AnimationTable,

    /// Whether critical-condition notifications are emitted.
    pub notifications: bool,

    /// Whether sound cues are emitted.
    pub sounds: bool,

    /// Volume attached to sound cues.
    pub sound_volume: f32,

    /// Whether background music is requested on start.
    pub music: bool,

    /// Volume attached to background music.
    pub music_volume: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pet_name: DEFAULT_PET_NAME.to_string(),
            save_path: PathBuf::from(SAVE_FILE_NAME),
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            auto_save_interval: Some(Duration::from_secs(DEFAULT_AUTO_SAVE_MINUTES * 60)),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            sleep_cooldown: Duration::from_secs(DEFAULT_SLEEP_COOLDOWN_SECS),
            decay: DecayRules::default(),
            animations: AnimationTable::default(),
            notifications: true,
            sounds: true,
            sound_volume: 0.8,
            music: true,
            music_volume: 0.5,
        }
    }
}

impl Config {
    /// Create a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take auto-save, notification, sound, and music preferences from settings.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.auto_save_interval = settings.auto_save.then(|| {
            Duration::from_secs(u64::from(settings.auto_save_interval_minutes.max(1)) * 60)
        });
        self.notifications = settings.show_notifications;
        self.sounds = settings.play_sounds;
        self.sound_volume = settings.sound_volume.clamp(0.0, 1.0);
        self.music = settings.play_music;
        self.music_volume = settings.music_volume.clamp(0.0, 1.0);
        self
    }

    /// Set the name for a newly hatched pet.
    pub fn pet_name(mut self, name: impl Into<String>) -> Self {
        self.pet_name = name.into();
        self
    }

    /// Set the save file path.
    pub fn save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = path.into();
        self
    }

    /// Set the sprite sheet directory.
    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    /// Set the interval between decay updates.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the auto-save interval, or `None` to disable auto-save.
    pub fn auto_save_interval(mut self, interval: Option<Duration>) -> Self {
        self.auto_save_interval = interval;
        self
    }

    /// Set the cooldown after feed, play, and medicine.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the cooldown after sleep.
    pub fn sleep_cooldown(mut self, cooldown: Duration) -> Self {
        self.sleep_cooldown = cooldown;
        self
    }

    /// Set the decay rules.
    pub fn decay(mut self, rules: DecayRules) -> Self {
        self.decay = rules;
        self
    }

    /// Set the longest gap one update will simulate.
    pub fn max_catch_up(mut self, cap: Option<chrono::Duration>) -> Self {
        self.decay.max_catch_up = cap;
        self
    }

    /// Set the animation table.
    pub fn animations(mut self, table: AnimationTable) -> Self {
        self.animations = table;
        self
    }

    /// Enable or disable critical-condition notifications.
    pub fn notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    /// Enable or disable sound cues.
    pub fn sounds(mut self, enabled: bool) -> Self {
        self.sounds = enabled;
        self
    }

    /// Enable or disable background music.
    pub fn music(mut self, enabled: bool) -> Self {
        self.music = enabled;
        self
    }

    /// The cooldown that follows `action`.
    pub fn cooldown_for(&self, action: Action) -> Duration {
        match action {
            Action::Sleep => self.sleep_cooldown,
            Action::Feed | Action::Play | Action::Medicine => self.cooldown,
        }
    }

    /// Check that every interval can drive a timer.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for a zero tick or auto-save interval.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(Error::config_error("tick interval must be greater than zero"));
        }
        if self.auto_save_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::config_error(
                "auto-save interval must be greater than zero",
            ));
        }
        if self.pet_name.trim().is_empty() {
            return Err(Error::config_error("pet name must not be empty"));
        }
        Ok(())
    }
}

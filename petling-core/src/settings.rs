//! User-facing settings stored as a flat JSON record.
//!
//! Settings are loaded once at startup and handed to [`crate::Config`] by
//! value. A missing file, a missing field, or a malformed file all fall back
//! to defaults; nothing here stops the pet from starting.

use crate::error::{Error, Result};
use crate::save::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const DEFAULT_AUTO_SAVE_INTERVAL_MINUTES: u32 = 5;
const DEFAULT_SOUND_VOLUME: f32 = 0.8;
const DEFAULT_MUSIC_VOLUME: f32 = 0.5;
const DEFAULT_THEME: &str = "Default";

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Whether the periodic auto-save runs.
    pub auto_save: bool,
    /// Minutes between auto-saves.
    pub auto_save_interval_minutes: u32,
    /// Whether action sound effects play.
    pub play_sounds: bool,
    /// Whether background music plays.
    pub play_music: bool,
    /// Sound effect volume in `0.0..=1.0`.
    pub sound_volume: f32,
    /// Music volume in `0.0..=1.0`.
    pub music_volume: f32,
    /// Keep simulating while the window is hidden.
    pub run_in_background: bool,
    /// Whether critical-condition notifications are shown.
    pub show_notifications: bool,
    /// Launch at login.
    pub start_with_windows: bool,
    /// UI theme name.
    pub theme: String,
    /// Whether tips are shown in the UI.
    pub show_tips: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_save_interval_minutes: DEFAULT_AUTO_SAVE_INTERVAL_MINUTES,
            play_sounds: true,
            play_music: true,
            sound_volume: DEFAULT_SOUND_VOLUME,
            music_volume: DEFAULT_MUSIC_VOLUME,
            run_in_background: false,
            show_notifications: true,
            start_with_windows: false,
            theme: DEFAULT_THEME.to_string(),
            show_tips: true,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// Fields absent from the file take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| Error::SettingsParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(settings.normalized())
    }

    /// Load settings, substituting defaults for a missing or unreadable file.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(Error::SettingsRead { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "could not load settings, using defaults");
                Self::default()
            }
        }
    }

    /// Write the settings to a JSON file, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_vec_pretty(self).map_err(|source| Error::Encode {
                path: path.to_path_buf(),
                source,
            })?;

        write_atomic(path, &content).map_err(|source| Error::SettingsWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Clamp volumes into range and keep the auto-save interval non-zero.
    pub fn normalized(mut self) -> Self {
        self.sound_volume = clamp_volume(self.sound_volume, DEFAULT_SOUND_VOLUME);
        self.music_volume = clamp_volume(self.music_volume, DEFAULT_MUSIC_VOLUME);
        if self.auto_save_interval_minutes == 0 {
            self.auto_save_interval_minutes = DEFAULT_AUTO_SAVE_INTERVAL_MINUTES;
        }
        self
    }
}

fn clamp_volume(volume: f32, fallback: f32) -> f32 {
    if volume.is_nan() {
        fallback
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert!(settings.auto_save);
        assert_eq!(settings.auto_save_interval_minutes, 5);
        assert!(settings.play_sounds);
        assert!(settings.play_music);
        assert!((settings.sound_volume - 0.8).abs() < f32::EPSILON);
        assert!((settings.music_volume - 0.5).abs() < f32::EPSILON);
        assert!(!settings.run_in_background);
        assert!(settings.show_notifications);
        assert_eq!(settings.theme, "Default");
        assert!(settings.show_tips);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load_or_default(dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ \"autoSave\": ").unwrap();

        assert!(matches!(
            Settings::load(&path),
            Err(Error::SettingsParse { .. })
        ));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "autoSave": false, "autoSaveIntervalMinutes": 1 }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(!settings.auto_save);
        assert_eq!(settings.auto_save_interval_minutes, 1);
        assert!(settings.play_sounds);
        assert_eq!(settings.theme, "Default");
    }

    #[test]
    fn test_volumes_are_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "soundVolume": 3.5, "musicVolume": -1.0 }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!((settings.sound_volume - 1.0).abs() < f32::EPSILON);
        assert!(settings.music_volume.abs() < f32::EPSILON);
    }

    #[test]
    fn test_zero_interval_falls_back() {
        let settings = Settings {
            auto_save_interval_minutes: 0,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.auto_save_interval_minutes, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            auto_save: false,
            theme: "Night".to_string(),
            ..Settings::default()
        };

        settings.save(&path).expect("should save");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"autoSaveIntervalMinutes\""));

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Settings persistence (save/load).

use crate::config::settings::Settings;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Table;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to determine config directory")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Manages the settings file.
///
/// The server calls [`SettingsStore::load`] before every render, so edits to
/// the file take effect on the next popup without a restart.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the standard per-user config location.
    pub fn new() -> Result<Self, SettingsError> {
        let project_dirs = ProjectDirs::from("", "", "volosd").ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::at(project_dirs.config_dir().join("settings.toml")))
    }

    /// Store at the standard location, or under the temp dir when the user
    /// has no resolvable home directory.
    pub fn locate() -> Self {
        match Self::new() {
            Ok(store) => store,
            Err(e) => {
                let fallback = std::env::temp_dir().join("volosd").join("settings.toml");
                warn!("{}; using {}", e, fallback.display());
                Self::at(fallback)
            }
        }
    }

    /// Store backed by an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. Never fails.
    ///
    /// A missing file is created with defaults. Any field that is missing,
    /// mistyped or out of range is replaced by its default on its own.
    pub fn load(&self) -> Settings {
        if !self.path.exists() {
            let defaults = Settings::default();
            match self.save(&defaults) {
                Ok(()) => info!("Wrote default settings to {}", self.path.display()),
                Err(e) => warn!("Could not write default settings: {}", e),
            }
            return defaults;
        }

        let content = match fs::read(&self.path) {
            Ok(bytes) => decode(bytes),
            Err(e) => {
                warn!("Could not read {}: {}", self.path.display(), e);
                return Settings::default();
            }
        };

        let (settings, issues) = Settings::from_table(&parse_table(&content));
        for issue in issues {
            if issue.reason == "missing" {
                debug!("Setting {} missing, using default", issue.key);
            } else {
                warn!("Setting {} invalid ({}), using default", issue.key, issue.reason);
            }
        }
        settings
    }

    /// Save settings, creating the parent directory if needed.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, settings.to_toml()?)?;
        Ok(())
    }
}

/// Decode the file as UTF-8, dropping only the lines with invalid bytes.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            warn!("Settings file is not valid UTF-8, skipping undecodable lines");
            String::from_utf8_lossy(e.as_bytes())
                .lines()
                .filter(|line| !line.contains(char::REPLACEMENT_CHARACTER))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Parse a settings file, salvaging individual lines when the file as a
/// whole is not valid TOML.
fn parse_table(content: &str) -> Table {
    match content.parse::<Table>() {
        Ok(table) => table,
        Err(e) => {
            warn!("Settings file is not valid TOML, recovering line by line: {}", e);
            let mut table = Table::new();
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                    continue;
                }
                if let Ok(entry) = line.parse::<Table>() {
                    table.extend(entry);
                }
            }
            table
        }
    }
}

//! Settings file handling for the `mkv-insert` binary.
//!
//! A missing file is written with defaults and section comments. An
//! existing file is read as-is; keys it lacks are filled in and unknown
//! tables are removed in place with `toml_edit`, so user comments and
//! ordering survive. Every write goes through a temp file and a rename.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use toml_edit::DocumentMut;

use super::settings::{ConfigSection, Settings};
use crate::rules::RuleGraphError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    Edit(#[from] toml_edit::TomlError),

    #[error("Invalid format rules: {0}")]
    Rules(#[from] RuleGraphError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file at one path.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Nothing is read until [`load_or_create`](Self::load_or_create).
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load the file, writing defaults first if it does not exist.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            self.settings = Settings::default();
            let content = defaults_with_comments(&self.settings)?;
            self.atomic_write(&content)?;
            tracing::info!("Wrote default settings to {}", self.config_path.display());
            return Ok(());
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;

        let mut doc: DocumentMut = content.parse()?;
        if reconcile(&mut doc, &self.settings)? {
            tracing::debug!("Completing settings file {}", self.config_path.display());
            self.atomic_write(&doc.to_string())?;
        }
        Ok(())
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Same directory, so the rename cannot cross filesystems.
        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.config_path)
    }
}

/// Bring `doc` in line with the known sections: drop unknown tables and
/// add whatever key `settings` has that the file does not. Returns whether
/// anything changed.
fn reconcile(doc: &mut DocumentMut, settings: &Settings) -> ConfigResult<bool> {
    let mut changed = false;

    let unknown: Vec<String> = doc
        .iter()
        .map(|(key, _)| key.to_string())
        .filter(|key| !ConfigSection::ALL.iter().any(|s| s.table_name() == key))
        .collect();
    for key in unknown {
        tracing::warn!("Removing unknown settings table [{}]", key);
        doc.remove(&key);
        changed = true;
    }

    let complete: DocumentMut = toml::to_string_pretty(settings)?.parse()?;
    for (section, item) in complete.iter() {
        let Some(expected) = item.as_table() else {
            continue;
        };
        match doc.get_mut(section).and_then(|i| i.as_table_mut()) {
            Some(present) => {
                for (key, value) in expected.iter() {
                    if !present.contains_key(key) {
                        present.insert(key, value.clone());
                        changed = true;
                    }
                }
            }
            None => {
                doc.insert(section, item.clone());
                changed = true;
            }
        }
    }

    Ok(changed)
}

/// Full default file, one commented table per section.
fn defaults_with_comments(settings: &Settings) -> ConfigResult<String> {
    let mut output = String::from("# mkv-insert configuration\n");

    for section in ConfigSection::ALL {
        let body = match section {
            ConfigSection::Paths => toml::to_string_pretty(&settings.paths)?,
            ConfigSection::Tools => toml::to_string_pretty(&settings.tools)?,
            ConfigSection::Merge => toml::to_string_pretty(&settings.merge)?,
            ConfigSection::Fidelity => toml::to_string_pretty(&settings.fidelity)?,
            ConfigSection::Logging => toml::to_string_pretty(&settings.logging)?,
        };
        output.push('\n');
        output.push_str(section.comment());
        output.push('\n');
        output.push_str(&format!("[{}]\n", section.table_name()));
        output.push_str(&body);
        if !body.ends_with('\n') {
            output.push('\n');
        }
    }

    Ok(output)
}

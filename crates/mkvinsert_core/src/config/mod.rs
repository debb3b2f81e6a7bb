//! Configuration for mkv-insert.
//!
//! - TOML settings split into logical sections
//! - Missing keys filled in place, comments preserved
//! - Atomic file writes (write to temp, then rename)
//! - Validation before a run (budget, thresholds, rule graph)
//!
//! # Example
//!
//! ```no_run
//! use mkvinsert_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new(".config/mkv-insert.toml");
//! config.load_or_create().unwrap();
//!
//! // Compile the rule graph; a bad rule string stops here
//! let rules = config.settings().validate().unwrap();
//! println!("{} formats ranked", rules.formats().count());
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, FidelitySettings, LoggingSettings, MergeSettings, PathSettings, Settings,
    ToolSettings,
};

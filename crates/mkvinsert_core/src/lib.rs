//! mkv-insert core - audio/subtitle reconciliation between two media files.
//!
//! Given an original source and an enriched variant of the same title,
//! decides which audio and subtitle tracks survive into one merged output
//! and emits the mkvmerge/ffmpeg commands that produce it. The pipeline in
//! [`orchestrator`] runs those commands; every decision before that is
//! plain data in, data out.

pub mod config;
pub mod fidelity;
pub mod fingerprint;
pub mod host;
pub mod logging;
pub mod models;
pub mod mux;
pub mod orchestrator;
pub mod probe;
pub mod rules;
pub mod runner;
pub mod selection;
pub mod subtitles;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}

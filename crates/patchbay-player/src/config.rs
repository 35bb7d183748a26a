//! Player configuration

use anyhow::Context;
use patchbay_graph::CoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings of one player run, read from TOML
///
/// ```toml
/// frames = 120
/// delta_t = 0.02
/// log_level = "debug"
///
/// [core]
/// emit_flow_events = true
/// legacy_compat = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerConfig {
    /// Frames to evaluate
    pub(crate) frames: u64,
    /// Seconds between frames
    pub(crate) delta_t: f64,
    /// Default tracing filter, overridden by `RUST_LOG`
    pub(crate) log_level: String,
    /// Graph core switches
    pub(crate) core: CoreConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frames: 60,
            delta_t: 1.0 / 60.0,
            log_level: "info".to_owned(),
            core: CoreConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Read a TOML file; missing keys keep their defaults
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply command line overrides
    #[must_use]
    pub(crate) fn with_overrides(mut self, frames: Option<u64>, delta_t: Option<f64>) -> Self {
        if let Some(frames) = frames {
            self.frames = frames;
        }
        if let Some(delta_t) = delta_t {
            self.delta_t = delta_t;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn partial_files_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frames = 5\n\n[core]\nemit_flow_events = true").unwrap();

        let config = PlayerConfig::load(file.path()).unwrap();
        assert_eq!(config.frames, 5);
        assert_eq!(config.log_level, "info");
        assert!(config.core.emit_flow_events);
        assert!(config.core.legacy_compat);
    }

    #[test]
    fn overrides_win() {
        let config = PlayerConfig::default().with_overrides(Some(3), None);
        assert_eq!(config.frames, 3);
        assert!((config.delta_t - 1.0 / 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_files_name_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frames = \"many\"").unwrap();

        let err = PlayerConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
        assert!(PlayerConfig::load(Path::new("/nonexistent/player.toml")).is_err());
    }
}

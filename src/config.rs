//! YAML settings
//!
//! Every section and field is optional; missing values take their defaults so
//! a settings file only needs to mention what it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extractor::ExtractorConfig;
use crate::interaction::InteractionConfig;
use crate::layout::{LayoutConfig, Viewport};
use crate::simulation::SimulationConfig;

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read
    #[error("could not read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The settings file is not valid YAML for [`Settings`]
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Debounce windows, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last resize before the layout is rebuilt
    pub resize_debounce_ms: u64,

    /// Quiet period after the last change to a watched input before it is
    /// rendered again
    pub watch_debounce_ms: u64,

    /// Seed for the random source; drawn from the host when absent
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resize_debounce_ms: 300,
            watch_debounce_ms: 300,
            seed: None,
        }
    }
}

/// All tunables of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extractor: ExtractorConfig,
    pub layout: LayoutConfig,
    pub simulation: SimulationConfig,
    pub interaction: InteractionConfig,
    pub session: SessionConfig,

    /// Drawing surface for headless rendering
    pub viewport: Viewport,
}

impl Settings {
    /// Parse settings from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Strategy;
    use crate::simulation::Profile;

    #[test]
    fn partial_document_fills_defaults() {
        let yaml = r#"
extractor:
  strategy: tiered
simulation:
  profile: basic
  timeout_ms: 1500
viewport:
  width: 1024
  height: 768
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.extractor.strategy, Strategy::Tiered);
        assert_eq!(settings.extractor.max_concepts, 15);
        assert_eq!(settings.simulation.profile, Profile::Basic);
        assert_eq!(settings.simulation.timeout_ms, 1500);
        assert_eq!(settings.simulation.margin, 60.0);
        assert_eq!(settings.interaction.release_delay_ms, 300);
        assert_eq!(settings.viewport, Viewport::new(1024.0, 768.0));
        assert_eq!(settings.session.seed, None);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
        assert_eq!(Settings::from_yaml("{}").unwrap(), Settings::default());
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let err = Settings::from_yaml("extractor:\n  strategy: magic\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn yaml_round_trip() {
        let mut settings = Settings::default();
        settings.session.seed = Some(7);
        let yaml = settings.to_yaml().unwrap();
        assert_eq!(Settings::from_yaml(&yaml).unwrap(), settings);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Settings::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "session:\n  seed: 42\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.session.seed, Some(42));
    }
}

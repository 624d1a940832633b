//! Toolkit configuration
//!
//! Settings follow the same shape as the converter settings elsewhere in the
//! crate: plain serde structs with sensible defaults, so a partial YAML or JSON
//! file only needs to name the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::key::KeyProfileSet;
use crate::error::{Result, ScoreError};

/// Settings for the whole toolkit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitSettings {
    pub parse: ParseSettings,
    pub analysis: AnalysisSettings,
}

/// Parser limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseSettings {
    /// Upper bound on XML nodes accepted from one document
    pub max_nodes: u32,

    /// Largest `<divisions>` value accepted
    pub max_divisions: i64,

    /// Longest single `<duration>`, `<backup>` or `<forward>`, in quarter notes
    pub max_duration_quarters: i64,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            max_nodes: 4_000_000,
            max_divisions: 1_000_000,
            max_duration_quarters: 4096,
        }
    }
}

/// Analysis tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Quantization grid for duration and beat histograms, in steps per quarter note
    pub subdivision: u32,

    /// Reference profile family used for key correlation
    pub profile: KeyProfileSet,

    /// How many runner-up keys the report lists
    pub alternative_keys: usize,

    /// How many spelled pitches the pitch distribution lists
    pub top_pitches: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            // 48 per quarter covers 64th notes and 32nd-note triplets
            subdivision: 48,
            profile: KeyProfileSet::KrumhanslKessler,
            alternative_keys: 4,
            top_pitches: 10,
        }
    }
}

impl ToolkitSettings {
    /// Parse settings from a YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(text)
            .map_err(|e| ScoreError::Config(format!("yaml: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)
            .map_err(|e| ScoreError::Config(format!("json: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file; `.json` is read as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ScoreError::io(path, e))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        log::debug!("loading settings from {}", path.display());
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis.subdivision == 0 {
            return Err(ScoreError::Config(
                "analysis.subdivision must be at least 1".to_string(),
            ));
        }
        if self.parse.max_nodes == 0 {
            return Err(ScoreError::Config(
                "parse.max_nodes must be at least 1".to_string(),
            ));
        }
        if self.parse.max_divisions < 1 || self.parse.max_duration_quarters < 1 {
            return Err(ScoreError::Config(
                "parse.max_divisions and parse.max_duration_quarters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ToolkitSettings::default();
        assert_eq!(settings.analysis.subdivision, 48);
        assert_eq!(settings.analysis.profile, KeyProfileSet::KrumhanslKessler);
        assert_eq!(settings.analysis.alternative_keys, 4);
        assert_eq!(settings.analysis.top_pitches, 10);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "analysis:\n  subdivision: 12\n  profile: temperley\n";
        let settings = ToolkitSettings::from_yaml(yaml).expect("yaml should load");
        assert_eq!(settings.analysis.subdivision, 12);
        assert_eq!(settings.analysis.profile, KeyProfileSet::Temperley);
        assert_eq!(settings.analysis.top_pitches, 10);
        assert_eq!(settings.parse, ParseSettings::default());
    }

    #[test]
    fn test_json_settings() {
        let json = r#"{"parse": {"max_nodes": 1000}, "analysis": {"alternative_keys": 2}}"#;
        let settings = ToolkitSettings::from_json(json).expect("json should load");
        assert_eq!(settings.parse.max_nodes, 1000);
        assert_eq!(settings.parse.max_divisions, 1_000_000);
        assert_eq!(settings.analysis.alternative_keys, 2);
        assert_eq!(settings.analysis.subdivision, 48);
    }

    #[test]
    fn test_zero_subdivision_rejected() {
        let err = ToolkitSettings::from_yaml("analysis:\n  subdivision: 0\n").unwrap_err();
        assert!(matches!(err, ScoreError::Config(_)));
    }

    #[test]
    fn test_zero_duration_limit_rejected() {
        let err = ToolkitSettings::from_yaml("parse:\n  max_duration_quarters: 0\n").unwrap_err();
        assert!(matches!(err, ScoreError::Config(_)));
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let err = ToolkitSettings::from_yaml("analysis:\n  profile: bogus\n").unwrap_err();
        assert!(matches!(err, ScoreError::Config(_)));
    }
}

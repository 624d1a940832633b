//! Load, save, analyze and retarget scores
//!
//! The free functions use default settings; `ScoreToolkit` carries explicit
//! ones.

use std::path::Path;

use crate::analysis::AnalysisReport;
use crate::config::ToolkitSettings;
use crate::converters::midi::{midi_to_score, score_to_midi};
use crate::converters::musicxml::{parse_musicxml, write_musicxml};
use crate::error::{Result, ScoreError};
use crate::models::{Instrument, Score};
use crate::transform::{retarget, MatchMode, PartSelector, RetargetOutcome};

/// Operations bound to one set of settings
#[derive(Debug, Clone, Default)]
pub struct ScoreToolkit {
    pub settings: ToolkitSettings,
}

impl ScoreToolkit {
    pub fn new(settings: ToolkitSettings) -> Self {
        Self { settings }
    }

    /// Settings from a YAML or JSON file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ToolkitSettings::load(path)?))
    }

    pub fn parse(&self, xml: &str) -> Result<Score> {
        parse_musicxml(xml, &self.settings.parse)
    }

    /// Read and parse a MusicXML file
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Score> {
        let path = path.as_ref();
        log::info!("loading {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| ScoreError::io(path, e))?;

        self.parse(&text).map_err(|e| match e {
            ScoreError::MalformedScore { reason, position } => ScoreError::MalformedScore {
                reason: format!("{}: {}", path.display(), reason),
                position,
            },
            other => other,
        })
    }

    /// Serialize and write a score, creating missing parent directories.
    /// Nothing is written if serialization fails.
    pub fn save(&self, score: &Score, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let xml = write_musicxml(score)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                log::debug!("creating {}", parent.display());
                std::fs::create_dir_all(parent).map_err(|e| ScoreError::io(parent, e))?;
            }
        }
        std::fs::write(path, xml.as_bytes()).map_err(|e| ScoreError::io(path, e))?;
        log::info!("saved {} ({} bytes)", path.display(), xml.len());
        Ok(())
    }

    pub fn analyze(&self, score: &Score) -> Result<AnalysisReport> {
        let report = AnalysisReport::build(score, &self.settings.analysis)?;
        log::info!(
            "analyzed '{}': {} ({:.2}), {} notes",
            score.title.as_deref().unwrap_or("untitled"),
            report.key,
            report.key.confidence,
            report.note_count
        );
        Ok(report)
    }

    /// Retarget the selected parts to the catalog instrument called `name`
    /// (a custom instrument when the name is unknown). A selector matching
    /// nothing is an error.
    pub fn change_instrument(
        &self,
        mut score: Score,
        selector: &PartSelector,
        name: &str,
    ) -> Result<Score> {
        self.retarget(&mut score, selector, name, MatchMode::Strict)?;
        Ok(score)
    }

    /// Like `change_instrument`, with the match mode chosen by the caller
    pub fn retarget(
        &self,
        score: &mut Score,
        selector: &PartSelector,
        name: &str,
        mode: MatchMode,
    ) -> Result<RetargetOutcome> {
        let instrument = Instrument::resolve(name);
        let outcome = retarget(score, selector, &instrument, mode)?;
        log::info!(
            "selector {} -> '{}': {} part(s) changed",
            selector,
            instrument.name,
            outcome.matched.len()
        );
        Ok(outcome)
    }

    pub fn export_midi(&self, score: &Score, tpq: u16) -> Result<Vec<u8>> {
        score_to_midi(score, tpq)
    }

    /// Read a Standard MIDI File into a score
    pub fn import_midi(&self, path: impl AsRef<Path>) -> Result<Score> {
        let path = path.as_ref();
        log::info!("importing {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| ScoreError::io(path, e))?;
        midi_to_score(&bytes)
    }
}

pub fn load_score(path: impl AsRef<Path>) -> Result<Score> {
    ScoreToolkit::default().load(path)
}

pub fn load_midi(path: impl AsRef<Path>) -> Result<Score> {
    ScoreToolkit::default().import_midi(path)
}

pub fn save_score(score: &Score, path: impl AsRef<Path>) -> Result<()> {
    ScoreToolkit::default().save(score, path)
}

pub fn analyze_score(score: &Score) -> Result<AnalysisReport> {
    ScoreToolkit::default().analyze(score)
}

pub fn change_instrument(score: Score, selector: &PartSelector, name: &str) -> Result<Score> {
    ScoreToolkit::default().change_instrument(score, selector, name)
}

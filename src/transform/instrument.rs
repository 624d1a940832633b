//! Instrument reassignment
//!
//! Only `Part::instrument` is touched. Measures, notes and parts that the
//! selector does not pick keep their exact values, which is what lets the
//! writer splice the change into the original markup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScoreError};
use crate::models::{Instrument, Score};

/// Which parts an instrument change applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PartSelector {
    /// Parts whose current instrument name matches (case-insensitive, trimmed)
    #[serde(rename = "name")]
    ByName(String),
    /// Zero-based part position
    #[serde(rename = "index")]
    ByIndex(usize),
    All,
}

impl PartSelector {
    /// Indices of the parts this selector picks, in part order
    pub fn matching_parts(&self, score: &Score) -> Vec<usize> {
        match self {
            PartSelector::ByName(name) => {
                let wanted = name.trim().to_lowercase();
                score
                    .parts
                    .iter()
                    .enumerate()
                    .filter(|(_, part)| part.instrument.name.trim().to_lowercase() == wanted)
                    .map(|(i, _)| i)
                    .collect()
            }
            PartSelector::ByIndex(index) if *index < score.parts.len() => vec![*index],
            PartSelector::ByIndex(_) => Vec::new(),
            PartSelector::All => (0..score.parts.len()).collect(),
        }
    }
}

impl fmt::Display for PartSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartSelector::ByName(name) => write!(f, "name '{}'", name),
            PartSelector::ByIndex(index) => write!(f, "index {}", index),
            PartSelector::All => f.write_str("all parts"),
        }
    }
}

/// What happens when a selector picks nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Fail with `PartNotFound`
    #[default]
    Strict,
    /// Change nothing and report an empty match list
    Lenient,
}

/// Parts changed by a retarget, as part indices
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RetargetOutcome {
    pub matched: Vec<usize>,
}

impl RetargetOutcome {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Assign `instrument` to every part picked by `selector`.
///
/// Nothing is modified when an error is returned.
pub fn retarget(
    score: &mut Score,
    selector: &PartSelector,
    instrument: &Instrument,
    mode: MatchMode,
) -> Result<RetargetOutcome> {
    let name = instrument.name.trim();
    if name.is_empty() {
        return Err(ScoreError::InvalidInstrument(
            "instrument name is blank".to_string(),
        ));
    }
    let replacement = Instrument {
        name: name.to_string(),
        abbreviation: instrument
            .abbreviation
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        program: instrument.program,
    };

    let matched = selector.matching_parts(score);
    if matched.is_empty() {
        return match mode {
            MatchMode::Strict => Err(ScoreError::PartNotFound {
                selector: selector.to_string(),
            }),
            MatchMode::Lenient => {
                log::info!("selector {} matched no part; score unchanged", selector);
                Ok(RetargetOutcome::default())
            }
        };
    }

    for &index in &matched {
        let part = &mut score.parts[index];
        log::debug!(
            "part '{}': {} -> {}",
            part.id,
            part.instrument.name,
            replacement.name
        );
        part.instrument = replacement.clone();
    }

    Ok(RetargetOutcome { matched })
}

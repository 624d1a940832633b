//! Retained markup for byte-preserving serialization
//!
//! When a score is parsed, the original text is kept together with the byte
//! spans of the elements an instrument change may touch. Writing the score
//! back splices new text into those spans only; every other byte of the
//! document is reproduced as it was read.

use std::ops::Range;

use super::instrument::Instrument;
use super::score::{Measure, Score};

/// Byte span of one element in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpan {
    /// From `<` of the start tag to `>` of the end tag
    pub range: Range<usize>,

    /// Between the start and end tags; `None` for a self-closing element
    pub content: Option<Range<usize>>,
}

impl ElementSpan {
    pub fn is_self_closing(&self) -> bool {
        self.content.is_none()
    }
}

/// Original document text plus the span map
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub text: String,

    /// The `<part-list>` element
    pub part_list: Option<ElementSpan>,

    pub parts: Vec<PartSource>,

    /// Content as parsed; splicing is only valid while the score still matches it
    pub baseline: Option<Baseline>,
}

impl SourceDocument {
    pub fn new(text: String, parts: Vec<PartSource>) -> Self {
        Self {
            text,
            part_list: None,
            parts,
            baseline: None,
        }
    }

    /// Span record for a part id
    pub fn part(&self, id: &str) -> Option<&PartSource> {
        self.parts.iter().find(|p| p.id == id)
    }

    /// True when everything except instrument assignments is as parsed
    pub fn matches_content(&self, score: &Score) -> bool {
        let Some(baseline) = &self.baseline else {
            return false;
        };
        baseline.title == score.title
            && baseline.composer == score.composer
            && baseline.parts.len() == score.parts.len()
            && baseline
                .parts
                .iter()
                .zip(&score.parts)
                .all(|((id, measures), part)| *id == part.id && *measures == part.measures)
    }
}

/// Snapshot of parsed content that instrument changes must not disturb
#[derive(Debug, Clone)]
pub struct Baseline {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub parts: Vec<(String, Vec<Measure>)>,
}

impl Baseline {
    pub fn capture(score: &Score) -> Self {
        Self {
            title: score.title.clone(),
            composer: score.composer.clone(),
            parts: score
                .parts
                .iter()
                .map(|p| (p.id.clone(), p.measures.clone()))
                .collect(),
        }
    }
}

/// Where a part's instrument metadata lives in the source text
#[derive(Debug, Clone)]
pub struct PartSource {
    pub id: String,

    /// Instrument as it was parsed; a part whose instrument still equals this
    /// is written back untouched
    pub original: Instrument,

    /// `<score-part>`; `None` when the part list has no entry for this id
    pub score_part: Option<ElementSpan>,

    pub part_name: Option<ElementSpan>,
    pub part_abbreviation: Option<ElementSpan>,

    /// Where a missing `<part-name>` goes: after `<identification>` and `<part-link>`
    pub part_name_insert: Option<usize>,

    /// Where a missing `<part-abbreviation>` goes: after `<part-name-display>`
    /// or `<part-name>`
    pub part_abbreviation_insert: Option<usize>,

    /// First `<score-instrument>` and its `id` attribute
    pub score_instrument: Option<ElementSpan>,
    pub score_instrument_id: Option<String>,
    pub instrument_name: Option<ElementSpan>,

    /// Start of the first `<player>`, `<midi-device>` or `<midi-instrument>`;
    /// a new `<score-instrument>` goes before it
    pub first_after_instruments: Option<usize>,

    /// First `<midi-instrument>`
    pub midi_instrument: Option<ElementSpan>,
    pub midi_program: Option<ElementSpan>,

    /// Where a missing `<midi-program>` belongs inside `<midi-instrument>`
    pub midi_program_insert: Option<usize>,
}

impl PartSource {
    pub fn new(id: impl Into<String>, original: Instrument) -> Self {
        Self {
            id: id.into(),
            original,
            score_part: None,
            part_name: None,
            part_abbreviation: None,
            part_name_insert: None,
            part_abbreviation_insert: None,
            score_instrument: None,
            score_instrument_id: None,
            instrument_name: None,
            first_after_instruments: None,
            midi_instrument: None,
            midi_program: None,
            midi_program_insert: None,
        }
    }
}

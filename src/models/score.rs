//! Score model: Score → Part → Measure → Note
//!
//! The tree is owned top-down; a Note belongs to exactly one Measure and a
//! Measure to exactly one Part. Durations and onsets are exact rationals in
//! quarter notes, so derived sums (histogram weights, measure lengths) never
//! accumulate floating-point error.

use serde::Serialize;

use super::instrument::Instrument;
use super::pitch::{KeySignature, Pitch, TimeSignature};
use super::source::SourceDocument;
use super::Rational;

/// Root of the model
#[derive(Debug, Clone)]
pub struct Score {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub parts: Vec<Part>,

    /// Original markup and span map, present when the score came from the parser
    pub source: Option<SourceDocument>,
}

// Identity is musical content and metadata; the retained markup is not compared.
impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.composer == other.composer && self.parts == other.parts
    }
}

impl Score {
    /// Build a score that did not come from markup
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            title: None,
            composer: None,
            parts,
            source: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_composer(mut self, composer: impl Into<String>) -> Self {
        self.composer = Some(composer.into());
        self
    }

    /// Every note in declared order: parts, then measures, then notes
    pub fn notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.parts
            .iter()
            .flat_map(|part| part.measures.iter())
            .flat_map(|measure| measure.notes.iter())
    }

    /// Number of measures in the longest part
    pub fn measure_count(&self) -> usize {
        self.parts.iter().map(|p| p.measures.len()).max().unwrap_or(0)
    }

    /// First key signature declared anywhere, in part order
    pub fn declared_key(&self) -> Option<KeySignature> {
        self.parts
            .iter()
            .flat_map(|part| part.measures.iter())
            .find_map(|measure| measure.key)
    }

    /// Instrument names in part order
    pub fn instrument_names(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.instrument.name.clone()).collect()
    }
}

/// One instrument/voice line
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// MusicXML part id (e.g. "P1")
    pub id: String,
    pub instrument: Instrument,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: impl Into<String>, instrument: Instrument) -> Self {
        Self {
            id: id.into(),
            instrument,
            measures: Vec::new(),
        }
    }

    /// Append a measure, assigning the next sequential index and a matching number
    pub fn push_measure(&mut self, mut measure: Measure) {
        measure.index = self.measures.len() as u32 + 1;
        if measure.number.is_empty() {
            measure.number = measure.index.to_string();
        }
        self.measures.push(measure);
    }

    /// Time signature in effect for each measure, carried forward from the last declaration
    pub fn effective_time_signatures(&self) -> Vec<Option<TimeSignature>> {
        let mut current = None;
        self.measures
            .iter()
            .map(|m| {
                if m.time.is_some() {
                    current = m.time;
                }
                current
            })
            .collect()
    }
}

/// A time-bounded container of notes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measure {
    /// 1-based position within the part
    pub index: u32,

    /// Declared `number` attribute (not necessarily numeric)
    pub number: String,

    /// Pickup or otherwise uncounted measure
    pub implicit: bool,

    pub key: Option<KeySignature>,
    pub time: Option<TimeSignature>,

    /// Tempo in quarter notes per minute from `<sound tempo>`
    pub tempo: Option<f64>,

    pub notes: Vec<Note>,
}

impl Measure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time(mut self, time: TimeSignature) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_key(mut self, key: KeySignature) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }

    /// Latest note end within the measure (zero when empty)
    pub fn content_duration(&self) -> Rational {
        self.notes
            .iter()
            .map(|n| n.onset + n.duration)
            .max()
            .unwrap_or_else(|| Rational::from_integer(0))
    }
}

/// What a note sounds like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "pitch", rename_all = "lowercase")]
pub enum Sound {
    Pitched(Pitch),
    /// Percussion hit without a definite pitch
    Unpitched,
    Rest,
}

/// A note or rest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub sound: Sound,

    /// Length in quarter notes
    pub duration: Rational,

    /// Offset from the start of the containing measure, in quarter notes
    pub onset: Rational,
}

impl Note {
    pub fn pitched(pitch: Pitch, onset: Rational, duration: Rational) -> Self {
        Self {
            sound: Sound::Pitched(pitch),
            duration,
            onset,
        }
    }

    pub fn rest(onset: Rational, duration: Rational) -> Self {
        Self {
            sound: Sound::Rest,
            duration,
            onset,
        }
    }

    pub fn unpitched(onset: Rational, duration: Rational) -> Self {
        Self {
            sound: Sound::Unpitched,
            duration,
            onset,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.sound, Sound::Rest)
    }

    pub fn pitch(&self) -> Option<&Pitch> {
        match &self.sound {
            Sound::Pitched(p) => Some(p),
            _ => None,
        }
    }
}

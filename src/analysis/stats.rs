//! Note statistics and rhythmic distribution

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::AnalysisSettings;
use crate::models::{Part, Pitch, Rational, Score};

/// Derived counts and distributions for one score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreStats {
    /// Pitched and unpitched notes; rests excluded
    pub note_count: usize,
    pub rest_count: usize,
    /// Lowest and highest sounding pitch; `None` without pitched notes
    pub pitch_range: Option<(Pitch, Pitch)>,
    /// Quantized note duration → occurrences
    pub duration_histogram: BTreeMap<Rational, usize>,
    /// Quantized onset within the measure → occurrences
    pub beat_histogram: BTreeMap<Rational, usize>,
    /// Most frequent first, ties broken by MIDI number
    pub pitch_counts: Vec<PitchCount>,
    pub irregular_measures: Vec<MeasureIrregularity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PitchCount {
    pub name: String,
    pub midi: i16,
    pub count: usize,
}

/// A measure whose content does not add up to its time signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureIrregularity {
    pub part_id: String,
    pub measure_number: String,
    pub expected: Rational,
    pub actual: Rational,
}

/// Snap `value` to the nearest multiple of `1/subdivision`
pub fn quantize(value: Rational, subdivision: u32) -> Rational {
    let grid = Rational::from_integer(subdivision.max(1) as i64);
    (value * grid).round() / grid
}

pub fn analyze_stats(score: &Score, settings: &AnalysisSettings) -> ScoreStats {
    let mut note_count = 0;
    let mut rest_count = 0;
    let mut lowest: Option<Pitch> = None;
    let mut highest: Option<Pitch> = None;
    let mut duration_histogram = BTreeMap::new();
    let mut beat_histogram = BTreeMap::new();
    // Spelled pitches in first-seen order
    let mut spelled: Vec<PitchCount> = Vec::new();

    for note in score.notes() {
        if note.is_rest() {
            rest_count += 1;
            continue;
        }
        note_count += 1;
        *duration_histogram
            .entry(quantize(note.duration, settings.subdivision))
            .or_insert(0) += 1;
        *beat_histogram
            .entry(quantize(note.onset, settings.subdivision))
            .or_insert(0) += 1;

        let Some(pitch) = note.pitch() else {
            continue;
        };
        // Strict comparisons: the first pitch at an extreme wins
        if lowest.map_or(true, |low| pitch.midi() < low.midi()) {
            lowest = Some(*pitch);
        }
        if highest.map_or(true, |high| pitch.midi() > high.midi()) {
            highest = Some(*pitch);
        }

        let name = pitch.name();
        match spelled.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.count += 1,
            None => spelled.push(PitchCount {
                name,
                midi: pitch.midi(),
                count: 1,
            }),
        }
    }

    spelled.sort_by(|a, b| b.count.cmp(&a.count).then(a.midi.cmp(&b.midi)));

    ScoreStats {
        note_count,
        rest_count,
        pitch_range: lowest.zip(highest),
        duration_histogram,
        beat_histogram,
        pitch_counts: spelled,
        irregular_measures: irregular_measures(score),
    }
}

fn irregular_measures(score: &Score) -> Vec<MeasureIrregularity> {
    score.parts.iter().flat_map(part_irregularities).collect()
}

/// Measures of one part whose latest note end differs from the time signature
/// in effect. Pickups, empty measures and measures before any time signature
/// are not checked.
pub fn part_irregularities(part: &Part) -> Vec<MeasureIrregularity> {
    part.measures
        .iter()
        .zip(part.effective_time_signatures())
        .filter_map(|(measure, time)| {
            let time = time?;
            if measure.implicit || measure.notes.is_empty() {
                return None;
            }
            let expected = time.measure_duration();
            let actual = measure.content_duration();
            (actual != expected).then(|| MeasureIrregularity {
                part_id: part.id.clone(),
                measure_number: measure.number.clone(),
                expected,
                actual,
            })
        })
        .collect()
}

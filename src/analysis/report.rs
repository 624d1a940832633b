//! Analysis report: everything the analyzers derive, in one serializable value

use serde::Serialize;
use std::collections::BTreeMap;

use super::histogram::PitchClassHistogram;
use super::key::{estimate_key, rank_keys, KeyEstimate};
use super::stats::{analyze_stats, MeasureIrregularity, PitchCount};
use crate::config::AnalysisSettings;
use crate::error::Result;
use crate::models::{Pitch, Rational, Score};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub instruments: Vec<String>,
    pub part_count: usize,
    pub measure_count: usize,
    /// First declared key signature, e.g. "D major"
    pub declared_key: Option<String>,
    pub key: KeyEstimate,
    pub alternative_keys: Vec<KeyEstimate>,
    pub note_count: usize,
    pub rest_count: usize,
    pub pitch_range: Option<PitchRange>,
    pub pitch_class_histogram: PitchClassHistogram,
    pub duration_histogram: Vec<HistogramBin>,
    pub beat_histogram: Vec<HistogramBin>,
    pub pitch_distribution: Vec<PitchCount>,
    pub irregular_measures: Vec<IrregularMeasure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchRange {
    pub lowest: PitchSummary,
    pub highest: PitchSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PitchSummary {
    pub name: String,
    pub midi: i16,
}

impl From<Pitch> for PitchSummary {
    fn from(pitch: Pitch) -> Self {
        Self {
            name: pitch.name(),
            midi: pitch.midi(),
        }
    }
}

/// One histogram bucket; `label` is the exact value ("3/2"), `value` its float
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub label: String,
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrregularMeasure {
    pub part_id: String,
    pub measure: String,
    pub expected: String,
    pub actual: String,
}

impl From<MeasureIrregularity> for IrregularMeasure {
    fn from(m: MeasureIrregularity) -> Self {
        Self {
            part_id: m.part_id,
            measure: m.measure_number,
            expected: m.expected.to_string(),
            actual: m.actual.to_string(),
        }
    }
}

impl AnalysisReport {
    /// Run every analyzer over `score`.
    ///
    /// Fails with `InsufficientData` when no key can be estimated; the report
    /// never carries a placeholder key.
    pub fn build(score: &Score, settings: &AnalysisSettings) -> Result<Self> {
        let histogram = PitchClassHistogram::build(score);
        let key = estimate_key(&histogram, settings.profile)?;
        let alternative_keys = rank_keys(&histogram, settings.profile)?
            .into_iter()
            .filter(|k| !(k.tonic_pitch_class == key.tonic_pitch_class && k.mode == key.mode))
            .take(settings.alternative_keys)
            .collect();

        let stats = analyze_stats(score, settings);

        Ok(Self {
            title: score.title.clone(),
            composer: score.composer.clone(),
            instruments: score.instrument_names(),
            part_count: score.parts.len(),
            measure_count: score.measure_count(),
            declared_key: score.declared_key().map(|k| k.name()),
            key,
            alternative_keys,
            note_count: stats.note_count,
            rest_count: stats.rest_count,
            pitch_range: stats.pitch_range.map(|(low, high)| PitchRange {
                lowest: low.into(),
                highest: high.into(),
            }),
            pitch_class_histogram: histogram,
            duration_histogram: bins(&stats.duration_histogram),
            beat_histogram: bins(&stats.beat_histogram),
            pitch_distribution: stats
                .pitch_counts
                .into_iter()
                .take(settings.top_pitches)
                .collect(),
            irregular_measures: stats.irregular_measures.into_iter().map(Into::into).collect(),
        })
    }

    /// Structured mapping form
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn bins(histogram: &BTreeMap<Rational, usize>) -> Vec<HistogramBin> {
    histogram
        .iter()
        .map(|(value, count)| HistogramBin {
            label: value.to_string(),
            value: *value.numer() as f64 / *value.denom() as f64,
            count: *count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use crate::models::{Instrument, KeySignature, Measure, Mode, Note, Part, Step};

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d)
    }

    fn c_major_score() -> Score {
        let steps = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];
        let mut part = Part::new("P1", Instrument::named("Piano"));
        for chunk in steps.chunks(4) {
            let notes = chunk
                .iter()
                .enumerate()
                .map(|(i, step)| Note::pitched(Pitch::new(*step, 0, 4), q(i as i64, 1), q(1, 1)))
                .collect();
            let measure = Measure::new().with_notes(notes).with_key(KeySignature {
                fifths: 0,
                mode: Some(Mode::Major),
            });
            part.push_measure(measure);
        }
        Score::new(vec![part]).with_title("Scale").with_composer("Anon")
    }

    #[test]
    fn test_report_fields() {
        let settings = AnalysisSettings::default();
        let report = AnalysisReport::build(&c_major_score(), &settings).unwrap();

        assert_eq!(report.title.as_deref(), Some("Scale"));
        assert_eq!(report.instruments, vec!["Piano"]);
        assert_eq!(report.part_count, 1);
        assert_eq!(report.measure_count, 2);
        assert_eq!(report.declared_key.as_deref(), Some("C major"));
        assert_eq!(report.key.name(), "C major");
        assert!(report.key.confidence > 0.8);
        assert_eq!(report.alternative_keys.len(), settings.alternative_keys);
        assert!(report.alternative_keys.iter().all(|k| k.name() != "C major"));
        assert_eq!(report.note_count, 7);

        let range = report.pitch_range.as_ref().unwrap();
        assert_eq!(range.lowest, PitchSummary { name: "C4".to_string(), midi: 60 });
        assert_eq!(range.highest.name, "B4");

        assert_eq!(
            report.duration_histogram,
            vec![HistogramBin { label: "1".to_string(), value: 1.0, count: 7 }]
        );
        // No time signature is declared, so no measure length is checked
        assert!(report.irregular_measures.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let report = AnalysisReport::build(&c_major_score(), &AnalysisSettings::default()).unwrap();
        let json = report.to_json().unwrap();

        assert_eq!(json["key"]["tonic"], "C");
        assert_eq!(json["key"]["mode"], "major");
        assert_eq!(json["pitch_range"]["highest"]["midi"], 71);
        assert_eq!(json["beat_histogram"][0]["label"], "0");
        assert_eq!(json["pitch_class_histogram"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn test_top_pitches_limit() {
        let settings = AnalysisSettings {
            top_pitches: 3,
            ..AnalysisSettings::default()
        };
        let report = AnalysisReport::build(&c_major_score(), &settings).unwrap();
        assert_eq!(report.pitch_distribution.len(), 3);
        assert_eq!(report.pitch_distribution[0].name, "C4");
    }

    #[test]
    fn test_rest_only_score_is_an_error() {
        let mut part = Part::new("P1", Instrument::named("Piano"));
        part.push_measure(Measure::new().with_notes(vec![Note::rest(q(0, 1), q(4, 1))]));
        let err = AnalysisReport::build(&Score::new(vec![part]), &AnalysisSettings::default())
            .unwrap_err();
        assert!(matches!(err, ScoreError::InsufficientData(_)));
    }
}

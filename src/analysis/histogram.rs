//! Duration-weighted pitch-class histogram

use serde::Serialize;

use crate::models::{Rational, Score};

/// Twelve bins (C = 0 … B = 11) of accumulated duration, in quarter notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchClassHistogram {
    bins: [Rational; 12],
}

impl Default for PitchClassHistogram {
    fn default() -> Self {
        Self {
            bins: [Rational::from_integer(0); 12],
        }
    }
}

impl PitchClassHistogram {
    /// Accumulate every pitched note of every part into one histogram.
    /// Rests and unpitched notes contribute nothing.
    pub fn build(score: &Score) -> Self {
        let mut histogram = Self::default();
        for note in score.notes() {
            if let Some(pitch) = note.pitch() {
                histogram.add(pitch.pitch_class(), note.duration);
            }
        }
        histogram
    }

    /// Build directly from bin weights (pitch class order)
    pub fn from_bins(bins: [Rational; 12]) -> Self {
        Self { bins }
    }

    pub fn add(&mut self, pitch_class: u8, weight: Rational) {
        self.bins[(pitch_class % 12) as usize] += weight;
    }

    pub fn bins(&self) -> &[Rational; 12] {
        &self.bins
    }

    pub fn weight(&self, pitch_class: u8) -> Rational {
        self.bins[(pitch_class % 12) as usize]
    }

    /// Sum of all bins
    pub fn total(&self) -> Rational {
        self.bins.iter().copied().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.iter().all(|w| *w == Rational::from_integer(0))
    }

    /// Bins as floats, for correlation
    pub fn to_f64(&self) -> [f64; 12] {
        let mut out = [0.0; 12];
        for (slot, weight) in out.iter_mut().zip(self.bins.iter()) {
            *slot = *weight.numer() as f64 / *weight.denom() as f64;
        }
        out
    }
}

impl Serialize for PitchClassHistogram {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_f64().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Instrument, Measure, Note, Part, Pitch, Step};

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d)
    }

    fn two_part_score() -> Score {
        let mut upper = Part::new("P1", Instrument::named("Violin"));
        upper.push_measure(Measure::new().with_notes(vec![
            Note::pitched(Pitch::new(Step::E, 0, 5), q(0, 1), q(3, 2)),
            Note::rest(q(3, 2), q(1, 2)),
            Note::pitched(Pitch::new(Step::C, 1, 5), q(2, 1), q(2, 1)),
        ]));
        let mut lower = Part::new("P2", Instrument::named("Cello"));
        lower.push_measure(Measure::new().with_notes(vec![
            Note::pitched(Pitch::new(Step::D, -1, 3), q(0, 1), q(1, 3)), // Db = C#
            Note::unpitched(q(1, 3), q(2, 3)),
            Note::pitched(Pitch::new(Step::E, 0, 2), q(1, 1), q(3, 1)),
        ]));
        Score::new(vec![upper, lower])
    }

    #[test]
    fn test_accumulates_across_parts_by_pitch_class() {
        let histogram = PitchClassHistogram::build(&two_part_score());
        assert_eq!(histogram.weight(4), q(9, 2)); // E5 1.5 + E2 3
        assert_eq!(histogram.weight(1), q(7, 3)); // C#5 2 + Db3 1/3
        assert_eq!(histogram.weight(0), q(0, 1));
    }

    #[test]
    fn test_total_equals_pitched_duration() {
        let score = two_part_score();
        let histogram = PitchClassHistogram::build(&score);
        let pitched: Rational = score
            .notes()
            .filter(|n| n.pitch().is_some())
            .map(|n| n.duration)
            .sum();
        assert_eq!(histogram.total(), pitched);
        assert_eq!(histogram.total(), q(41, 6));
    }

    #[test]
    fn test_rest_only_score_is_empty() {
        let mut part = Part::new("P1", Instrument::named("Piano"));
        part.push_measure(Measure::new().with_notes(vec![Note::rest(q(0, 1), q(4, 1))]));
        let histogram = PitchClassHistogram::build(&Score::new(vec![part]));
        assert!(histogram.is_empty());
        assert_eq!(histogram.to_f64(), [0.0; 12]);
    }
}

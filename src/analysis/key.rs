//! Krumhansl–Schmuckler key finding
//!
//! The duration-weighted pitch-class histogram is correlated (Pearson) with
//! each of the 24 rotated major/minor profiles; the best fit is the key.
//! Two profile families are available: the original Krumhansl–Kessler listener
//! ratings and Temperley's revised weights.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::histogram::PitchClassHistogram;
use crate::error::{Result, ScoreError};
use crate::models::pitch::tonic_name;
use crate::models::Mode;

/// A later candidate must beat the incumbent by more than this to replace it
const TIE_EPSILON: f64 = 1e-12;

const KRUMHANSL_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const KRUMHANSL_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const TEMPERLEY_MAJOR: [f64; 12] = [
    5.0, 2.0, 3.5, 2.0, 4.5, 4.0, 2.0, 4.5, 2.0, 3.5, 1.5, 4.0,
];
const TEMPERLEY_MINOR: [f64; 12] = [
    5.0, 2.0, 3.5, 4.5, 2.0, 4.0, 2.0, 4.5, 3.5, 2.0, 1.5, 4.0,
];

/// Which reference profiles to correlate against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyProfileSet {
    #[default]
    KrumhanslKessler,
    Temperley,
}

impl KeyProfileSet {
    fn profiles(self) -> &'static [KeyProfile; 24] {
        match self {
            KeyProfileSet::KrumhanslKessler => &KRUMHANSL_KESSLER,
            KeyProfileSet::Temperley => &TEMPERLEY,
        }
    }
}

/// One of the 24 rotated reference vectors
#[derive(Debug, Clone, Copy)]
pub struct KeyProfile {
    pub tonic: u8,
    pub mode: Mode,
    /// Weight per absolute pitch class (already rotated to `tonic`)
    pub weights: [f64; 12],
}

static KRUMHANSL_KESSLER: Lazy<[KeyProfile; 24]> =
    Lazy::new(|| rotations(&KRUMHANSL_MAJOR, &KRUMHANSL_MINOR));
static TEMPERLEY: Lazy<[KeyProfile; 24]> =
    Lazy::new(|| rotations(&TEMPERLEY_MAJOR, &TEMPERLEY_MINOR));

/// Scan order: major C..B, then minor C..B
fn rotations(major: &[f64; 12], minor: &[f64; 12]) -> [KeyProfile; 24] {
    let mut out = [KeyProfile {
        tonic: 0,
        mode: Mode::Major,
        weights: [0.0; 12],
    }; 24];
    for (slot, profile) in out.iter_mut().enumerate() {
        let (mode, base) = if slot < 12 {
            (Mode::Major, major)
        } else {
            (Mode::Minor, minor)
        };
        let tonic = (slot % 12) as u8;
        let mut weights = [0.0; 12];
        for (pc, weight) in weights.iter_mut().enumerate() {
            *weight = base[(pc + 12 - tonic as usize) % 12];
        }
        *profile = KeyProfile { tonic, mode, weights };
    }
    out
}

/// Outcome of key finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEstimate {
    pub tonic_pitch_class: u8,
    pub tonic: String,
    pub mode: Mode,
    /// Pearson r against the winning profile, -1..=1
    pub correlation: f64,
    /// `(r + 1) / 2`, 0..=1
    pub confidence: f64,
}

impl KeyEstimate {
    fn from_profile(profile: &KeyProfile, correlation: f64) -> Self {
        Self {
            tonic_pitch_class: profile.tonic,
            tonic: tonic_name(profile.tonic, profile.mode).to_string(),
            mode: profile.mode,
            correlation,
            confidence: (correlation + 1.0) / 2.0,
        }
    }

    /// "Eb major", "C# minor"
    pub fn name(&self) -> String {
        format!("{} {}", self.tonic, self.mode)
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// Best-fitting key for the histogram.
///
/// Fails with `InsufficientData` when the histogram has no variance (no
/// pitched notes at all, or every pitch class weighted equally): the
/// correlation is undefined and no key can be preferred.
pub fn estimate_key(histogram: &PitchClassHistogram, set: KeyProfileSet) -> Result<KeyEstimate> {
    let scores = correlations(histogram, set)?;

    let mut best = 0;
    for (i, (_, r)) in scores.iter().enumerate().skip(1) {
        if *r > scores[best].1 + TIE_EPSILON {
            best = i;
        }
    }

    let (profile, r) = scores[best];
    let estimate = KeyEstimate::from_profile(profile, r);
    log::debug!("estimated key {} (r = {:.4})", estimate, r);
    Ok(estimate)
}

/// All 24 keys, best first. Exact ties keep scan order.
pub fn rank_keys(histogram: &PitchClassHistogram, set: KeyProfileSet) -> Result<Vec<KeyEstimate>> {
    let mut scores = correlations(histogram, set)?;
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(scores
        .into_iter()
        .map(|(profile, r)| KeyEstimate::from_profile(profile, r))
        .collect())
}

fn correlations(
    histogram: &PitchClassHistogram,
    set: KeyProfileSet,
) -> Result<Vec<(&'static KeyProfile, f64)>> {
    if histogram.is_empty() {
        return Err(ScoreError::InsufficientData(
            "score contains no pitched notes".to_string(),
        ));
    }
    let bins = histogram.bins();
    if bins.iter().all(|w| *w == bins[0]) {
        return Err(ScoreError::InsufficientData(
            "pitch-class distribution is flat".to_string(),
        ));
    }

    let x = histogram.to_f64();
    Ok(set
        .profiles()
        .iter()
        .map(|profile| (profile, pearson(&x, &profile.weights)))
        .collect())
}

/// Pearson correlation; 0 when either side has no variance
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let mean_x = x.iter().sum::<f64>() / 12.0;
    let mean_y = y.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cov / denom
    }
}

//! Score analysis
//!
//! ```text
//! Score ─┬─> PitchClassHistogram ──> KeyEstimate ─┐
//!        └─> ScoreStats ──────────────────────────┴─> AnalysisReport
//! ```
//!
//! Every analyzer is a pure function of an already-parsed Score.

pub mod histogram;
pub mod key;
pub mod report;
pub mod stats;

pub use histogram::PitchClassHistogram;
pub use key::{estimate_key, rank_keys, KeyEstimate, KeyProfileSet};
pub use report::AnalysisReport;
pub use stats::{analyze_stats, MeasureIrregularity, ScoreStats};

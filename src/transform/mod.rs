//! Structural score mutations

pub mod instrument;

pub use instrument::{retarget, MatchMode, PartSelector, RetargetOutcome};

//! Score analysis and instrument retargeting
//!
//! Parses MusicXML into a typed score model, derives musical properties
//! (key estimate, note statistics, rhythmic distribution) and reassigns
//! instruments while writing the rest of the document back untouched.
//!
//! ```text
//! MusicXML ──parse──> Score ──┬──> analysis ──> AnalysisReport
//!                             ├──> transform ──> Score ──write──> MusicXML
//!                             └──> converters::midi ──> SMF bytes
//! ```

pub mod analysis;
pub mod api;
pub mod config;
pub mod converters;
pub mod error;
pub mod models;
pub mod transform;

// Re-export commonly used types
pub use analysis::{AnalysisReport, KeyEstimate, KeyProfileSet};
pub use api::{
    analyze_score, change_instrument, load_midi, load_score, save_score, ScoreToolkit,
};
pub use config::{AnalysisSettings, ParseSettings, ToolkitSettings};
pub use error::{Result, ScoreError};
pub use models::{Instrument, Measure, Note, Part, Pitch, Rational, Score};
pub use transform::{MatchMode, PartSelector, RetargetOutcome};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    // Fails only if a logger is already installed
    #[cfg(feature = "console_log")]
    let _ = console_log::init_with_level(log::Level::Debug);

    log::info!("score toolkit WASM module initialized");
}

//! Score ↔ Standard MIDI File
//!
//! ```text
//! Score ─[build_timeline]─> Timeline (absolute ticks) ─[write_smf]─> SMF bytes
//! SMF bytes ─[midi_to_score]─> Score (barlines from the conductor map)
//! ```

mod model;
mod read;
mod write;

pub use model::{build_timeline, MidiNote, Tempo, TimeSig, Timeline, TrackPlan, DEFAULT_BPM};
pub use read::midi_to_score;
pub use write::write_smf;

use crate::error::{Result, ScoreError};
use crate::models::Score;

/// Encode `score` as SMF format 1
///
/// # Arguments
/// * `score` - the score to export
/// * `tpq` - ticks per quarter note (typically 480 or 960)
pub fn score_to_midi(score: &Score, tpq: u16) -> Result<Vec<u8>> {
    if tpq == 0 || tpq > 0x7FFF {
        return Err(ScoreError::Midi(format!(
            "ticks per quarter must be 1..=32767, got {}",
            tpq
        )));
    }
    let timeline = build_timeline(score, tpq);
    let mut out = Vec::new();
    write_smf(&timeline, &mut out)?;
    log::debug!(
        "exported {} part tracks, {} bytes",
        timeline.tracks.len(),
        out.len()
    );
    Ok(out)
}

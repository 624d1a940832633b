//! Format converters
//!
//! MusicXML is read and written losslessly; MIDI files are
//! exported and imported, quantized to the measures of their time signatures.

pub mod midi;
pub mod musicxml;

pub use midi::{midi_to_score, score_to_midi};
pub use musicxml::{generate_musicxml, parse_musicxml, write_musicxml};

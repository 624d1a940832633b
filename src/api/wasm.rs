//! Browser API
//!
//! Thin `wasm-bindgen` wrappers over the boundary operations. Scores travel
//! as MusicXML text; reports as plain JS objects.

use wasm_bindgen::prelude::*;

use super::boundary::ScoreToolkit;
use super::helpers::{deserialize, score_error, serialize};
use crate::converters::midi::midi_to_score;
use crate::converters::musicxml::generate_musicxml;
use crate::transform::{MatchMode, PartSelector};

/// Analyze a MusicXML document
///
/// # Returns
/// The analysis report as a JS object (key, statistics, histograms)
#[wasm_bindgen(js_name = analyzeMusicXML)]
pub fn analyze_musicxml(xml: &str) -> Result<JsValue, JsValue> {
    log::info!("analyzeMusicXML called ({} bytes)", xml.len());
    let toolkit = ScoreToolkit::default();
    let score = toolkit.parse(xml).map_err(|e| score_error("analyzeMusicXML", e))?;
    let report = toolkit
        .analyze(&score)
        .map_err(|e| score_error("analyzeMusicXML", e))?;
    serialize(&report, "analyzeMusicXML: report serialization failed")
}

/// Change the instrument of selected parts
///
/// # Parameters
/// - `selector`: `{ kind: "name", value: "Violin" }`, `{ kind: "index", value: 0 }`
///   or `{ kind: "all" }`
/// - `name`: catalog instrument name, or any custom name
/// - `strict`: fail when the selector matches no part
///
/// # Returns
/// The rewritten MusicXML. Untouched markup is preserved byte for byte.
#[wasm_bindgen(js_name = changeInstrument)]
pub fn change_instrument(
    xml: &str,
    selector: JsValue,
    name: &str,
    strict: bool,
) -> Result<String, JsValue> {
    let selector: PartSelector = deserialize(selector, "changeInstrument: invalid selector")?;
    log::info!("changeInstrument called: {} -> '{}'", selector, name);

    let toolkit = ScoreToolkit::default();
    let mut score = toolkit.parse(xml).map_err(|e| score_error("changeInstrument", e))?;
    let mode = if strict {
        MatchMode::Strict
    } else {
        MatchMode::Lenient
    };
    toolkit
        .retarget(&mut score, &selector, name, mode)
        .map_err(|e| score_error("changeInstrument", e))?;

    crate::converters::musicxml::write_musicxml(&score)
        .map_err(|e| score_error("changeInstrument", e))
}

/// Convert MusicXML to a Standard MIDI File
///
/// # Parameters
/// - `tpq`: ticks per quarter note, 0 for the default (480)
///
/// # Returns
/// MIDI file as Uint8Array (format 1)
#[wasm_bindgen(js_name = exportMidi)]
pub fn export_midi(xml: &str, tpq: u16) -> Result<js_sys::Uint8Array, JsValue> {
    let tpq = if tpq == 0 { DEFAULT_TPQ } else { tpq };
    log::info!("exportMidi called with tpq={}", tpq);

    let toolkit = ScoreToolkit::default();
    let score = toolkit.parse(xml).map_err(|e| score_error("exportMidi", e))?;
    let midi_bytes = toolkit
        .export_midi(&score, tpq)
        .map_err(|e| score_error("exportMidi", e))?;

    log::info!("MIDI generated: {} bytes", midi_bytes.len());
    let uint8_array = js_sys::Uint8Array::new_with_length(midi_bytes.len() as u32);
    uint8_array.copy_from(&midi_bytes);
    Ok(uint8_array)
}

/// Convert a Standard MIDI File to MusicXML
#[wasm_bindgen(js_name = importMidi)]
pub fn import_midi(bytes: &[u8]) -> Result<String, JsValue> {
    log::info!("importMidi called with {} bytes", bytes.len());
    let score = midi_to_score(bytes).map_err(|e| score_error("importMidi", e))?;
    generate_musicxml(&score).map_err(|e| score_error("importMidi", e))
}

/// Names accepted by `changeInstrument` without falling back to a custom instrument
#[wasm_bindgen(js_name = instrumentCatalog)]
pub fn instrument_catalog() -> Vec<String> {
    crate::models::instrument::catalog_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

const DEFAULT_TPQ: u16 = 480;

//! Browser API tests
//!
//! Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

mod common;

use common::{C_MAJOR_DUO, RESTS_ONLY};
use score_toolkit::api::wasm::{analyze_musicxml, change_instrument, export_midi, import_midi};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn selector(json: &str) -> JsValue {
    js_sys::JSON::parse(json).unwrap()
}

#[wasm_bindgen_test]
fn test_analyze_returns_report_object() {
    let report = analyze_musicxml(C_MAJOR_DUO).unwrap();
    let key = js_sys::Reflect::get(&report, &JsValue::from_str("key")).unwrap();
    let tonic = js_sys::Reflect::get(&key, &JsValue::from_str("tonic")).unwrap();
    assert_eq!(tonic.as_string().as_deref(), Some("C"));
}

#[wasm_bindgen_test]
fn test_analyze_rests_only_is_error() {
    let err = analyze_musicxml(RESTS_ONLY).unwrap_err();
    assert!(err.as_string().unwrap().contains("insufficient data"));
}

#[wasm_bindgen_test]
fn test_change_instrument_by_name() {
    let xml = change_instrument(
        C_MAJOR_DUO,
        selector(r#"{"kind": "name", "value": "Bass"}"#),
        "cello",
        true,
    )
    .unwrap();
    assert!(xml.contains("<part-name>Violoncello</part-name>"));
    assert!(xml.contains("<part-name>Piano</part-name>"));
}

#[wasm_bindgen_test]
fn test_change_instrument_strict_miss() {
    let strict = change_instrument(C_MAJOR_DUO, selector(r#"{"kind": "index", "value": 7}"#), "oboe", true);
    assert!(strict.is_err());

    let lenient =
        change_instrument(C_MAJOR_DUO, selector(r#"{"kind": "index", "value": 7}"#), "oboe", false)
            .unwrap();
    assert_eq!(lenient, C_MAJOR_DUO);
}

#[wasm_bindgen_test]
fn test_export_midi_bytes() {
    let bytes = export_midi(C_MAJOR_DUO, 0).unwrap().to_vec();
    assert_eq!(&bytes[0..4], b"MThd");
}

#[wasm_bindgen_test]
fn test_import_midi_returns_musicxml() {
    let bytes = export_midi(C_MAJOR_DUO, 0).unwrap().to_vec();
    let xml = import_midi(&bytes).unwrap();
    assert!(xml.contains("<score-partwise"));
    assert!(xml.contains("<part-name>Piano</part-name>"));
}

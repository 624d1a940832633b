//! Public entry points
//!
//! - `boundary`: file and in-memory operations for Rust callers
//! - `wasm`: `wasm-bindgen` exports working on strings and bytes
//! - `helpers`: JS value conversion and error mapping for `wasm`

pub mod boundary;
pub mod helpers;
pub mod wasm;

pub use boundary::{
    analyze_score, change_instrument, load_midi, load_score, save_score, ScoreToolkit,
};

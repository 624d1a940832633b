//! MusicXML ↔ Score model
//!
//! # Architecture
//!
//! ```text
//! MusicXML String
//!   ↓ [parse with roxmltree, record instrument spans]
//! Score (+ SourceDocument)
//!   ↓ [instrument changes only → splice into source]
//!   ↓ [anything else / no source → regenerate with quick-xml]
//! MusicXML String
//! ```
//!
//! Round trip: re-parsing the written text yields a Score equal to the one
//! written. For parsed scores with instrument changes only, all bytes outside
//! the touched `<score-part>` entries are preserved.

pub mod parser;
mod splice;
pub mod writer;

pub use parser::parse_musicxml;
pub use writer::{generate_musicxml, write_musicxml};

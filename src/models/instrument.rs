//! Instrument identity and the built-in instrument catalog
//!
//! Program numbers are General MIDI, 0-based (0 = Acoustic Grand Piano).
//! MusicXML's `<midi-program>` counts from 1; the converters do the offset.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Instrument assigned to a part
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Display name (`<part-name>`), never blank
    pub name: String,

    /// Short name (`<part-abbreviation>`)
    pub abbreviation: Option<String>,

    /// General MIDI program, 0-based
    pub program: Option<u8>,
}

impl Instrument {
    /// Instrument with a name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbreviation: None,
            program: None,
        }
    }

    pub fn with_abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = Some(abbreviation.into());
        self
    }

    pub fn with_program(mut self, program: u8) -> Self {
        self.program = Some(program.min(127));
        self
    }

    /// Look a name up in the catalog (case-insensitive).
    ///
    /// Unknown names produce a custom instrument carrying the given name and no
    /// program; nothing is substituted behind the caller's back.
    pub fn resolve(name: &str) -> Self {
        let trimmed = name.trim();
        match CATALOG.get(trimmed.to_lowercase().as_str()) {
            Some(entry) => entry.to_instrument(),
            None => {
                log::info!("instrument '{}' is not in the catalog; using it as a custom name", trimmed);
                Instrument::named(trimmed)
            }
        }
    }

    /// True for instruments played on the General MIDI percussion channel
    pub fn is_percussion(&self) -> bool {
        let lower = self.name.to_lowercase();
        self.program.is_none()
            && CATALOG
                .get(lower.as_str())
                .map(|entry| entry.percussion)
                .unwrap_or(false)
    }
}

struct CatalogEntry {
    name: &'static str,
    abbreviation: &'static str,
    program: Option<u8>,
    percussion: bool,
}

impl CatalogEntry {
    const fn pitched(name: &'static str, abbreviation: &'static str, program: u8) -> Self {
        Self {
            name,
            abbreviation,
            program: Some(program),
            percussion: false,
        }
    }

    const fn percussion(name: &'static str, abbreviation: &'static str) -> Self {
        Self {
            name,
            abbreviation,
            program: None,
            percussion: true,
        }
    }

    fn to_instrument(&self) -> Instrument {
        Instrument {
            name: self.name.to_string(),
            abbreviation: Some(self.abbreviation.to_string()),
            program: self.program,
        }
    }
}

/// Lookup keys are lowercase; several keys may share one entry (e.g. "drums", "percussion")
static CATALOG: Lazy<HashMap<&'static str, CatalogEntry>> = Lazy::new(|| {
    let entries: [(&str, CatalogEntry); 30] = [
        ("piano", CatalogEntry::pitched("Piano", "Pno.", 0)),
        ("violin", CatalogEntry::pitched("Violin", "Vln.", 40)),
        ("viola", CatalogEntry::pitched("Viola", "Vla.", 41)),
        ("cello", CatalogEntry::pitched("Violoncello", "Vc.", 42)),
        ("violoncello", CatalogEntry::pitched("Violoncello", "Vc.", 42)),
        ("bass", CatalogEntry::pitched("Electric Bass", "Bass", 33)),
        ("electric bass", CatalogEntry::pitched("Electric Bass", "Bass", 33)),
        ("guitar", CatalogEntry::pitched("Guitar", "Gtr.", 24)),
        ("flute", CatalogEntry::pitched("Flute", "Fl.", 73)),
        ("clarinet", CatalogEntry::pitched("Clarinet", "Cl.", 71)),
        ("oboe", CatalogEntry::pitched("Oboe", "Ob.", 68)),
        ("trumpet", CatalogEntry::pitched("Trumpet", "Tpt.", 56)),
        ("horn", CatalogEntry::pitched("Horn", "Hn.", 60)),
        ("trombone", CatalogEntry::pitched("Trombone", "Tbn.", 57)),
        ("drums", CatalogEntry::percussion("Percussion", "Perc.")),
        ("percussion", CatalogEntry::percussion("Percussion", "Perc.")),
        ("voice", CatalogEntry::pitched("Voice", "V.", 53)),
        ("vocal", CatalogEntry::pitched("Voice", "V.", 53)),
        ("organ", CatalogEntry::pitched("Pipe Organ", "Org.", 19)),
        ("pipe organ", CatalogEntry::pitched("Pipe Organ", "Org.", 19)),
        ("saxophone", CatalogEntry::pitched("Saxophone", "Sax.", 65)),
        ("sax", CatalogEntry::pitched("Saxophone", "Sax.", 65)),
        // Chinese traditional instruments, mapped onto the closest GM timbres
        ("erhu", CatalogEntry::pitched("Erhu", "Erhu", 110)),
        ("pipa", CatalogEntry::pitched("Pipa", "Pipa", 24)),
        ("guzheng", CatalogEntry::pitched("Guzheng", "Gzh", 46)),
        ("dizi", CatalogEntry::pitched("Dizi", "Dizi", 73)),
        ("suona", CatalogEntry::pitched("Suona", "Suona", 68)),
        ("yangqin", CatalogEntry::pitched("Yangqin", "Yqin", 0)),
        ("electric guitar", CatalogEntry::pitched("Electric Guitar", "E.Gtr.", 27)),
        ("harp", CatalogEntry::pitched("Harp", "Hp.", 46)),
    ];
    entries.into_iter().collect()
});

/// Canonical names of every catalog instrument, sorted and deduplicated
pub fn catalog_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = CATALOG.values().map(|e| e.name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

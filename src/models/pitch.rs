//! Pitch representation and spelling
//!
//! A pitch is stored the way MusicXML spells it (step, alter, octave) so that
//! writing it back never re-spells an E# as F. MIDI numbers and pitch classes
//! are derived on demand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Diatonic step letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Semitones above C
    pub fn semitone(self) -> i16 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::C => "C",
            Step::D => "D",
            Step::E => "E",
            Step::F => "F",
            Step::G => "G",
            Step::A => "A",
            Step::B => "B",
        }
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" => Ok(Step::C),
            "D" | "d" => Ok(Step::D),
            "E" | "e" => Ok(Step::E),
            "F" | "f" => Ok(Step::F),
            "G" | "g" => Ok(Step::G),
            "A" | "a" => Ok(Step::A),
            "B" | "b" => Ok(Step::B),
            other => Err(format!("invalid step '{}'", other)),
        }
    }
}

/// A spelled pitch: step, chromatic alteration in semitones, octave (C4 = middle C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Self { step, alter, octave }
    }

    /// Spell a MIDI note number; black keys take sharps unless `prefer_flats`
    pub fn from_midi(key: u8, prefer_flats: bool) -> Self {
        const SHARPS: [(Step, i8); 12] = [
            (Step::C, 0), (Step::C, 1), (Step::D, 0), (Step::D, 1), (Step::E, 0), (Step::F, 0),
            (Step::F, 1), (Step::G, 0), (Step::G, 1), (Step::A, 0), (Step::A, 1), (Step::B, 0),
        ];
        const FLATS: [(Step, i8); 12] = [
            (Step::C, 0), (Step::D, -1), (Step::D, 0), (Step::E, -1), (Step::E, 0), (Step::F, 0),
            (Step::G, -1), (Step::G, 0), (Step::A, -1), (Step::A, 0), (Step::B, -1), (Step::B, 0),
        ];
        let table = if prefer_flats { &FLATS } else { &SHARPS };
        let (step, alter) = table[(key % 12) as usize];
        Self::new(step, alter, (key / 12) as i8 - 1)
    }

    /// MIDI note number (C4 = 60). Not clamped; extreme spellings may leave 0..=127.
    pub fn midi(&self) -> i16 {
        (self.octave as i16 + 1) * 12 + self.step.semitone() + self.alter as i16
    }

    /// Pitch class 0..=11 (C = 0)
    pub fn pitch_class(&self) -> u8 {
        self.midi().rem_euclid(12) as u8
    }

    /// Spelled name with octave, e.g. "C#4", "Bb3", "Fx5" is written "F##5"
    pub fn name(&self) -> String {
        format!("{}{}", self.name_without_octave(), self.octave)
    }

    pub fn name_without_octave(&self) -> String {
        let accidental = if self.alter >= 0 {
            "#".repeat(self.alter as usize)
        } else {
            "b".repeat(self.alter.unsigned_abs() as usize)
        };
        format!("{}{}", self.step.as_str(), accidental)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tonal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(Mode::Major),
            "minor" => Ok(Mode::Minor),
            other => Err(format!("unsupported mode '{}'", other)),
        }
    }
}

/// Pitch-class names with sharps
pub const SHARP_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Pitch-class names with flats
pub const FLAT_NAMES: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Conventional tonic spelling for a key: flats for Db/Eb/F/Gb/Ab/Bb major
/// and for the minor keys sharing their signatures (d, g, c, f, bb, eb).
pub fn tonic_name(pitch_class: u8, mode: Mode) -> &'static str {
    let pc = (pitch_class % 12) as usize;
    let flat = match mode {
        Mode::Major => matches!(pc, 1 | 3 | 5 | 6 | 8 | 10),
        Mode::Minor => matches!(pc, 0 | 2 | 3 | 5 | 7 | 10),
    };
    if flat {
        FLAT_NAMES[pc]
    } else {
        SHARP_NAMES[pc]
    }
}

/// Declared key signature (`<key><fifths>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Position on the circle of fifths, -7..=7
    pub fifths: i8,
    pub mode: Option<Mode>,
}

impl KeySignature {
    /// Tonic pitch class implied by the signature and mode (major when unspecified)
    pub fn tonic_pitch_class(&self) -> u8 {
        let major = (self.fifths as i16 * 7).rem_euclid(12);
        let pc = match self.mode {
            Some(Mode::Minor) => (major + 9) % 12,
            _ => major,
        };
        pc as u8
    }

    /// Human readable name, e.g. "Eb major", "F# minor"
    pub fn name(&self) -> String {
        let mode = self.mode.unwrap_or(Mode::Major);
        let pc = self.tonic_pitch_class();
        // Spell from the signature itself: flat signatures take flat tonics
        let tonic = if self.fifths < 0 {
            FLAT_NAMES[pc as usize]
        } else if self.fifths > 0 {
            SHARP_NAMES[pc as usize]
        } else {
            tonic_name(pc, mode)
        };
        let tonic = match (self.fifths, mode) {
            (-7, Mode::Major) => "Cb",
            (6, Mode::Major) => "F#",
            (7, Mode::Major) => "C#",
            (-6, Mode::Minor) => "Eb",
            (-7, Mode::Minor) => "Ab",
            (7, Mode::Minor) => "A#",
            _ => tonic,
        };
        format!("{} {}", tonic, mode)
    }
}

/// Declared time signature (`<time>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u32,
    pub beat_type: u32,
}

impl TimeSignature {
    pub fn new(beats: u32, beat_type: u32) -> Self {
        Self { beats, beat_type }
    }

    /// Nominal measure length in quarter notes
    pub fn measure_duration(&self) -> crate::models::Rational {
        crate::models::Rational::new(self.beats as i64 * 4, self.beat_type.max(1) as i64)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { beats: 4, beat_type: 4 }
    }
}

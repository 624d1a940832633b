//! Standard MIDI File import
//!
//! Every track that plays notes becomes a part. Tempo, time-signature and
//! key-signature events from all tracks form one conductor map, which lays
//! the same barlines over every part. Onsets and durations stay exact: a
//! tick is `1/tpq` of a quarter note.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::collections::HashMap;

use super::model::PERCUSSION_CHANNEL;
use crate::error::{Result, ScoreError};
use crate::models::{
    Instrument, KeySignature, Measure, Mode, Note, Part, Pitch, Rational, Score, Sound,
    TimeSignature,
};

/// Ticks per quarter assumed for SMPTE-timed files
const FALLBACK_TPQ: u16 = 480;

/// Longest score the importer lays out
const MAX_MEASURES: usize = 100_000;

#[derive(Debug, Clone)]
struct HeldNote {
    start: u64,
    end: u64,
    key: u8,
}

#[derive(Debug, Default)]
struct TrackNotes {
    name: Option<String>,
    program: Option<u8>,
    channel: Option<u8>,
    notes: Vec<HeldNote>,
}

/// Events that apply to every part, sorted by tick
#[derive(Debug, Default)]
struct ConductorMap {
    tempos: Vec<(u64, f64)>,
    times: Vec<(u64, TimeSignature)>,
    keys: Vec<(u64, KeySignature)>,
}

impl ConductorMap {
    fn sort(&mut self) {
        self.tempos.sort_by_key(|(tick, _)| *tick);
        self.times.sort_by_key(|(tick, _)| *tick);
        self.keys.sort_by_key(|(tick, _)| *tick);
    }

    /// Flats for black keys when the first key signature has flats
    fn prefers_flats(&self) -> bool {
        self.keys.first().map_or(false, |(_, key)| key.fifths < 0)
    }
}

/// One measure on the shared tick grid
#[derive(Debug, Clone)]
struct Bar {
    start: u64,
    end: u64,
    time: Option<TimeSignature>,
}

/// Decode a Standard MIDI File into a Score
///
/// # Example
///
/// ```ignore
/// let score = midi_to_score(&std::fs::read("song.mid")?)?;
/// println!("{}", generate_musicxml(&score)?);
/// ```
pub fn midi_to_score(bytes: &[u8]) -> Result<Score> {
    let smf = Smf::parse(bytes)
        .map_err(|e| ScoreError::Midi(format!("failed to parse MIDI: {}", e)))?;

    let tpq = match smf.header.timing {
        Timing::Metrical(tpq) if tpq.as_int() > 0 => tpq.as_int(),
        _ => {
            log::warn!(
                "MIDI file has no metrical timing; assuming {} ticks per quarter",
                FALLBACK_TPQ
            );
            FALLBACK_TPQ
        }
    };

    let mut conductor = ConductorMap::default();
    let tracks: Vec<TrackNotes> = smf
        .tracks
        .iter()
        .map(|track| read_track(track, &mut conductor))
        .collect();
    conductor.sort();

    // A leading track without notes names the piece
    let title = tracks
        .first()
        .filter(|track| track.notes.is_empty())
        .and_then(|track| track.name.clone());

    let playing: Vec<&TrackNotes> = tracks.iter().filter(|t| !t.notes.is_empty()).collect();
    if playing.is_empty() {
        return Err(ScoreError::Midi("MIDI file contains no notes".to_string()));
    }

    let end = playing
        .iter()
        .flat_map(|track| track.notes.iter().map(|n| n.end))
        .max()
        .unwrap_or(0);
    let bars = barlines(&conductor.times, tpq, end)?;
    let prefer_flats = conductor.prefers_flats();

    let parts = playing
        .iter()
        .enumerate()
        .map(|(i, track)| build_part(i, track, &bars, &conductor, tpq, prefer_flats))
        .collect();

    let mut score = Score::new(parts);
    score.title = title;
    log::debug!(
        "imported MIDI: {} part(s), {} measure(s) at {} ticks per quarter",
        score.parts.len(),
        bars.len(),
        tpq
    );
    Ok(score)
}

fn read_track(events: &[TrackEvent], conductor: &mut ConductorMap) -> TrackNotes {
    let mut track = TrackNotes::default();
    // Start ticks of sounding notes per (channel, key), oldest first
    let mut sounding: HashMap<(u8, u8), Vec<u64>> = HashMap::new();
    let mut tick = 0u64;

    for event in events {
        tick += u64::from(event.delta.as_int());

        match event.kind {
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        track.channel.get_or_insert(channel);
                        sounding.entry((channel, key.as_int())).or_default().push(tick);
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let key = key.as_int();
                        match sounding.get_mut(&(channel, key)) {
                            Some(starts) if !starts.is_empty() => {
                                let start = starts.remove(0);
                                push_note(&mut track, start, tick, key);
                            }
                            _ => log::debug!("note-off for silent key {} at tick {}", key, tick),
                        }
                    }
                    MidiMessage::ProgramChange { program } => {
                        track.channel.get_or_insert(channel);
                        track.program.get_or_insert(program.as_int());
                    }
                    _ => {}
                }
            }
            TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                let name = String::from_utf8_lossy(name).trim().to_string();
                if track.name.is_none() && !name.is_empty() {
                    track.name = Some(name);
                }
            }
            TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                let bpm = 60_000_000.0 / f64::from(micros.as_int().max(1));
                conductor.tempos.push((tick, (bpm * 100.0).round() / 100.0));
            }
            TrackEventKind::Meta(MetaMessage::TimeSignature(num, pow, _, _)) => {
                if num > 0 && pow < 16 {
                    conductor
                        .times
                        .push((tick, TimeSignature::new(u32::from(num), 1 << pow)));
                }
            }
            TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                conductor.keys.push((
                    tick,
                    KeySignature {
                        fifths: sharps.clamp(-7, 7),
                        mode: Some(if minor { Mode::Minor } else { Mode::Major }),
                    },
                ));
            }
            _ => {}
        }
    }

    // Notes never released end with the track
    for ((_, key), starts) in sounding {
        for start in starts {
            push_note(&mut track, start, tick, key);
        }
    }
    track.notes.sort_by_key(|n| (n.start, n.key));
    track
}

fn push_note(track: &mut TrackNotes, start: u64, end: u64, key: u8) {
    if end > start {
        track.notes.push(HeldNote { start, end, key });
    }
}

/// Measure boundaries from the time-signature map (4/4 until the first one),
/// continuing until `end` is covered. A time signature arriving mid-measure
/// closes the current measure early.
fn barlines(times: &[(u64, TimeSignature)], tpq: u16, end: u64) -> Result<Vec<Bar>> {
    let mut bars: Vec<Bar> = Vec::new();
    let mut current = TimeSignature::default();
    let mut pending = times.iter().peekable();
    let mut tick = 0u64;

    loop {
        let mut declared = None;
        while let Some((_, time)) = pending.next_if(|(at, _)| *at <= tick) {
            current = *time;
            declared = Some(current);
        }
        if bars.is_empty() {
            declared = Some(current);
        }

        let whole = u64::from(tpq) * 4 * u64::from(current.beats);
        let length = (whole / u64::from(current.beat_type.max(1))).max(1);
        let mut next = tick.saturating_add(length);
        if let Some((at, _)) = pending.peek() {
            next = next.min(*at);
        }

        bars.push(Bar {
            start: tick,
            end: next,
            time: declared,
        });
        if bars.len() > MAX_MEASURES {
            return Err(ScoreError::Midi(format!(
                "MIDI file spans more than {} measures",
                MAX_MEASURES
            )));
        }

        tick = next;
        if tick >= end {
            return Ok(bars);
        }
    }
}

fn build_part(
    index: usize,
    track: &TrackNotes,
    bars: &[Bar],
    conductor: &ConductorMap,
    tpq: u16,
    prefer_flats: bool,
) -> Part {
    let percussion = track.channel == Some(PERCUSSION_CHANNEL);
    let name = track.name.clone().unwrap_or_else(|| {
        if percussion {
            "Percussion".to_string()
        } else {
            format!("Track {}", index + 1)
        }
    });
    let instrument = Instrument {
        name,
        abbreviation: None,
        program: if percussion { None } else { track.program },
    };

    let in_bar = |bar: &Bar, tick: u64| tick >= bar.start && tick < bar.end;
    let mut measures: Vec<Measure> = bars
        .iter()
        .map(|bar| {
            let mut measure = Measure::new();
            measure.time = bar.time;
            measure.key = conductor
                .keys
                .iter()
                .filter(|(tick, _)| in_bar(bar, *tick))
                .map(|(_, key)| *key)
                .last();
            measure.tempo = conductor
                .tempos
                .iter()
                .find(|(tick, _)| in_bar(bar, *tick))
                .map(|(_, bpm)| *bpm);
            measure
        })
        .collect();

    let quarters = |ticks: u64| Rational::new(ticks as i64, i64::from(tpq));
    for note in &track.notes {
        let sound = if percussion {
            Sound::Unpitched
        } else {
            Sound::Pitched(Pitch::from_midi(note.key, prefer_flats))
        };

        // Split at barlines; each piece sounds within one measure
        let mut start = note.start;
        let mut bar_index = bars.partition_point(|bar| bar.start <= start).saturating_sub(1);
        while start < note.end && bar_index < bars.len() {
            let bar = &bars[bar_index];
            let piece_end = note.end.min(bar.end);
            measures[bar_index].notes.push(Note {
                sound,
                onset: quarters(start - bar.start),
                duration: quarters(piece_end - start),
            });
            start = piece_end;
            bar_index += 1;
        }
    }

    let mut part = Part::new(format!("P{}", index + 1), instrument);
    for mut measure in measures {
        measure.notes.sort_by_key(|n| n.onset);
        part.push_measure(measure);
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::midi::score_to_midi;
    use crate::models::Step;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d)
    }

    fn pitched(step: Step, alter: i8, octave: i8, onset: Rational, duration: Rational) -> Note {
        Note::pitched(Pitch::new(step, alter, octave), onset, duration)
    }

    fn waltz() -> Score {
        let mut flute = Part::new("P1", Instrument::named("Flute").with_program(73));
        flute.push_measure(
            Measure::new()
                .with_time(TimeSignature::new(3, 4))
                .with_notes(vec![
                    pitched(Step::C, 0, 5, q(0, 1), q(1, 1)),
                    pitched(Step::E, 0, 5, q(0, 1), q(1, 1)),
                    pitched(Step::F, 1, 5, q(1, 1), q(1, 2)),
                    pitched(Step::G, 0, 5, q(2, 1), q(1, 1)),
                ]),
        );
        flute.push_measure(Measure::new().with_notes(vec![pitched(Step::A, 0, 5, q(1, 1), q(2, 1))]));
        flute.measures[0].tempo = Some(90.0);

        let mut cello = Part::new("P2", Instrument::named("Cello").with_program(42));
        cello.push_measure(
            Measure::new()
                .with_time(TimeSignature::new(3, 4))
                .with_notes(vec![pitched(Step::C, 0, 3, q(0, 1), q(3, 1))]),
        );
        cello.push_measure(Measure::new().with_notes(vec![pitched(Step::G, 0, 2, q(0, 1), q(3, 1))]));
        cello.measures[0].tempo = Some(90.0);

        Score::new(vec![flute, cello])
    }

    #[test]
    fn test_round_trip_through_export() {
        let score = waltz();
        let bytes = score_to_midi(&score, 480).expect("export should succeed");
        let imported = midi_to_score(&bytes).expect("import should succeed");
        assert_eq!(imported, score);
    }

    #[test]
    fn test_odd_resolution_keeps_exact_durations() {
        let score = waltz();
        let bytes = score_to_midi(&score, 96).expect("export should succeed");
        let imported = midi_to_score(&bytes).expect("import should succeed");
        assert_eq!(imported.parts[0].measures[0].notes[2].duration, q(1, 2));
    }

    #[test]
    fn test_note_across_barline_is_split() {
        let mut part = Part::new("P1", Instrument::named("Horn").with_program(60));
        part.push_measure(
            Measure::new()
                .with_time(TimeSignature::new(2, 4))
                .with_notes(vec![pitched(Step::D, 0, 4, q(1, 1), q(3, 1))]),
        );
        let bytes = score_to_midi(&Score::new(vec![part]), 480).expect("export should succeed");
        let imported = midi_to_score(&bytes).expect("import should succeed");

        let measures = &imported.parts[0].measures;
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].notes[0].onset, q(1, 1));
        assert_eq!(measures[0].notes[0].duration, q(1, 1));
        assert_eq!(measures[1].notes[0].onset, q(0, 1));
        assert_eq!(measures[1].notes[0].duration, q(2, 1));
    }

    #[test]
    fn test_barlines_follow_time_signature_changes() {
        let times = vec![(0, TimeSignature::new(3, 4)), (1440 + 480, TimeSignature::new(6, 8))];
        let bars = barlines(&times, 480, 1440 * 3).unwrap();

        let starts: Vec<u64> = bars.iter().map(|b| b.start).collect();
        // The change arrives one beat into measure two, which closes early
        assert_eq!(starts, vec![0, 1440, 1920, 3360]);
        assert_eq!(bars[0].time, Some(TimeSignature::new(3, 4)));
        assert_eq!(bars[1].time, None);
        assert_eq!(bars[2].time, Some(TimeSignature::new(6, 8)));
    }

    #[test]
    fn test_no_time_signature_defaults_to_common_time() {
        let bars = barlines(&[], 480, 1).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].end, 1920);
        assert_eq!(bars[0].time, Some(TimeSignature::default()));
    }

    #[test]
    fn test_file_without_notes_rejected() {
        let mut part = Part::new("P1", Instrument::named("Piano"));
        part.push_measure(Measure::new().with_notes(vec![Note::rest(q(0, 1), q(4, 1))]));
        let bytes = score_to_midi(&Score::new(vec![part]), 480).expect("export should succeed");
        assert!(matches!(midi_to_score(&bytes), Err(ScoreError::Midi(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(midi_to_score(b"not a midi file"), Err(ScoreError::Midi(_))));
    }
}

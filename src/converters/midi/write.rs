use midly::num::u28;
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use super::model::{Timeline, TrackPlan};
use crate::error::{Result, ScoreError};

/// Write the timeline as a Standard MIDI File, format 1
pub fn write_smf(timeline: &Timeline, out: &mut Vec<u8>) -> Result<()> {
    let mut tracks = Vec::with_capacity(timeline.tracks.len() + 1);

    // Track 0: tempo and time signature map
    tracks.push(build_conductor_track(timeline)?);

    for plan in &timeline.tracks {
        tracks.push(build_part_track(plan)?);
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(timeline.tpq.into()),
        },
        tracks,
    };

    smf.write(out)
        .map_err(|e| ScoreError::Midi(format!("failed to write MIDI: {}", e)))
}

/// Largest value of an SMF variable-length time (28 bits)
const MAX_TICK: u32 = 0x0FFF_FFFF;

/// Absolute tick as a delta-time field
fn event_tick(tick: u64) -> Result<u28> {
    match u32::try_from(tick) {
        Ok(t) if t <= MAX_TICK => Ok(t.into()),
        _ => Err(ScoreError::Midi(format!(
            "tick {} is beyond the MIDI time range",
            tick
        ))),
    }
}

fn build_conductor_track<'a>(timeline: &Timeline) -> Result<Track<'a>> {
    let mut events = Vec::new();

    for tempo in &timeline.tempos {
        let micros_per_quarter = (60_000_000.0 / tempo.bpm).round().clamp(1.0, 16_777_215.0) as u32;
        events.push(TrackEvent {
            delta: event_tick(tempo.tick)?,
            kind: TrackEventKind::Meta(MetaMessage::Tempo(micros_per_quarter.into())),
        });
    }

    for ts in &timeline.timesigs {
        if !ts.den.is_power_of_two() {
            log::warn!("time signature {}/{} has no MIDI form, skipped", ts.num, ts.den);
            continue;
        }
        events.push(TrackEvent {
            delta: event_tick(ts.tick)?,
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                ts.num,
                ts.den.trailing_zeros() as u8,
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per quarter
            )),
        });
    }

    events.sort_by_key(|e| e.delta.as_int());
    convert_to_delta_times(&mut events);
    events.push(end_of_track());
    Ok(events)
}

fn build_part_track(plan: &TrackPlan) -> Result<Track<'_>> {
    let channel = plan.channel.into();
    let mut events = vec![TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(plan.name.as_bytes())),
    }];

    if let Some(program) = plan.program {
        events.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: program.into(),
                },
            },
        });
    }

    for note in &plan.notes {
        events.push(TrackEvent {
            delta: event_tick(note.start_tick)?,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: note.key.into(),
                    vel: note.vel.into(),
                },
            },
        });
        events.push(TrackEvent {
            delta: event_tick(note.start_tick.saturating_add(note.dur_tick))?,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: note.key.into(),
                    vel: 0.into(),
                },
            },
        });
    }

    // Stable: a note-off keeps its place ahead of a later note-on at the same tick
    events.sort_by_key(|e| e.delta.as_int());
    convert_to_delta_times(&mut events);
    events.push(end_of_track());
    Ok(events)
}

fn end_of_track<'a>() -> TrackEvent<'a> {
    TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

/// Absolute ticks to deltas (time since the previous event)
fn convert_to_delta_times(events: &mut [TrackEvent]) {
    let mut prev_tick = 0u32;
    for event in events.iter_mut() {
        let current_tick = event.delta.as_int();
        event.delta = current_tick.saturating_sub(prev_tick).into();
        prev_tick = current_tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::midi::model::{MidiNote, Tempo, TimeSig};

    fn timeline(tracks: Vec<TrackPlan>) -> Timeline {
        Timeline {
            tpq: 480,
            tempos: vec![Tempo { tick: 0, bpm: 120.0 }],
            timesigs: vec![TimeSig { tick: 0, num: 4, den: 4 }],
            tracks,
        }
    }

    fn track(name: &str, channel: u8, keys: &[u8]) -> TrackPlan {
        TrackPlan {
            name: name.to_string(),
            channel,
            program: Some(0),
            notes: keys
                .iter()
                .enumerate()
                .map(|(i, key)| MidiNote {
                    start_tick: i as u64 * 480,
                    dur_tick: 480,
                    key: *key,
                    vel: 64,
                })
                .collect(),
        }
    }

    #[test]
    fn test_delta_time_conversion() {
        let mut events = vec![
            TrackEvent {
                delta: 0.into(),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Test")),
            },
            TrackEvent {
                delta: 100.into(),
                kind: TrackEventKind::Meta(MetaMessage::Marker(b"a")),
            },
            TrackEvent {
                delta: 250.into(),
                kind: TrackEventKind::Meta(MetaMessage::Marker(b"b")),
            },
        ];
        convert_to_delta_times(&mut events);
        let deltas: Vec<u32> = events.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![0, 100, 150]);
    }

    #[test]
    fn test_multi_track_header() {
        let mut out = Vec::new();
        write_smf(
            &timeline(vec![track("Piano", 0, &[60]), track("Violin", 1, &[64, 67])]),
            &mut out,
        )
        .unwrap();

        assert_eq!(&out[0..4], b"MThd");
        // Format 1
        assert_eq!(&out[8..10], &[0x00, 0x01]);
        // Conductor + 2 parts
        assert_eq!(&out[10..12], &[0x00, 0x03]);
    }

    #[test]
    fn test_repeated_key_releases_before_retrigger() {
        let plan = track("Flute", 0, &[72, 72]);
        let events = build_part_track(&plan).unwrap();
        let messages: Vec<&str> = events
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. } => Some("on"),
                TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. } => Some("off"),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec!["on", "off", "on", "off"]);
    }

    #[test]
    fn test_odd_denominator_time_signature_skipped() {
        let mut tl = timeline(vec![]);
        tl.timesigs.push(TimeSig { tick: 0, num: 5, den: 6 });
        let events = build_conductor_track(&tl).unwrap();
        let count = events
            .iter()
            .filter(|e| matches!(e.kind, TrackEventKind::Meta(MetaMessage::TimeSignature(..))))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_tick_beyond_midi_range_is_an_error() {
        let mut plan = track("Organ", 0, &[48]);
        plan.notes[0].dur_tick = u64::from(u32::MAX) + 10;
        assert!(matches!(build_part_track(&plan), Err(ScoreError::Midi(_))));

        plan.notes[0].dur_tick = 0x1000_0000;
        assert!(matches!(build_part_track(&plan), Err(ScoreError::Midi(_))));

        plan.notes[0].dur_tick = 0x0FFF_FFFF;
        assert!(build_part_track(&plan).is_ok());
    }
}

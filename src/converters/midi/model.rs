/// Tick-based timeline for MIDI export
///
/// Flattening the measure tree into absolute ticks happens here; `write`
/// only turns these records into midly events.
use crate::models::{Rational, Score, TimeSignature};

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_VELOCITY: u8 = 64;
pub const PERCUSSION_CHANNEL: u8 = 9;
/// GM Acoustic Snare, used for unpitched hits
pub const UNPITCHED_KEY: u8 = 38;

#[derive(Debug, Clone)]
pub struct Timeline {
    pub tpq: u16,
    pub tempos: Vec<Tempo>,     // sorted by tick
    pub timesigs: Vec<TimeSig>, // sorted by tick
    pub tracks: Vec<TrackPlan>,
}

#[derive(Debug, Clone)]
pub struct Tempo {
    pub tick: u64,
    pub bpm: f64,
}

#[derive(Debug, Clone)]
pub struct TimeSig {
    pub tick: u64,
    pub num: u8,
    pub den: u32,
}

#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub name: String,
    pub channel: u8,         // 0-15 (9 = drums)
    pub program: Option<u8>, // GM, 0-based
    pub notes: Vec<MidiNote>,
}

#[derive(Debug, Clone)]
pub struct MidiNote {
    pub start_tick: u64,
    pub dur_tick: u64,
    pub key: u8,
    pub vel: u8,
}

/// Quarter-note position to ticks, rounded to the nearest tick
pub fn quarters_to_ticks(quarters: Rational, tpq: u16) -> u64 {
    let ticks = (quarters * Rational::from_integer(tpq as i64)).round();
    ticks.to_integer().max(0) as u64
}

/// Melodic channels in order, skipping the drum channel
fn melodic_channel(n: usize) -> u8 {
    const MELODIC: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];
    MELODIC[n % MELODIC.len()]
}

/// Start of every measure, in quarters, shared by all parts.
///
/// A measure lasts as long as its latest-ending note in any part; a measure
/// that is empty everywhere takes its time-signature length.
fn measure_starts(score: &Score) -> Vec<Rational> {
    let count = score.measure_count();
    let zero = Rational::from_integer(0);
    let times: Vec<Vec<Option<TimeSignature>>> = score
        .parts
        .iter()
        .map(|part| part.effective_time_signatures())
        .collect();

    let mut starts = Vec::with_capacity(count + 1);
    let mut position = zero;
    for i in 0..count {
        starts.push(position);
        let content = score
            .parts
            .iter()
            .filter_map(|part| part.measures.get(i))
            .map(|measure| measure.content_duration())
            .max()
            .unwrap_or(zero);
        let length = if content > zero {
            content
        } else {
            times
                .iter()
                .find_map(|part_times| part_times.get(i).copied().flatten())
                .unwrap_or_default()
                .measure_duration()
        };
        position += length;
    }
    starts.push(position);
    starts
}

/// Lay the score out on one tick timeline
pub fn build_timeline(score: &Score, tpq: u16) -> Timeline {
    let starts = measure_starts(score);

    let mut tempos = Vec::new();
    let mut timesigs = Vec::new();
    if let Some(first) = score.parts.first() {
        for (measure, start) in first.measures.iter().zip(&starts) {
            let tick = quarters_to_ticks(*start, tpq);
            if let Some(bpm) = measure.tempo.filter(|bpm| *bpm > 0.0) {
                tempos.push(Tempo { tick, bpm });
            }
            if let Some(time) = measure.time {
                timesigs.push(TimeSig {
                    tick,
                    num: time.beats.min(u8::MAX as u32) as u8,
                    den: time.beat_type,
                });
            }
        }
    }
    if tempos.first().map_or(true, |t| t.tick > 0) {
        tempos.insert(0, Tempo { tick: 0, bpm: DEFAULT_BPM });
    }

    let mut melodic = 0;
    let tracks = score
        .parts
        .iter()
        .map(|part| {
            let percussion = part.instrument.is_percussion();
            let channel = if percussion {
                PERCUSSION_CHANNEL
            } else {
                let channel = melodic_channel(melodic);
                melodic += 1;
                channel
            };

            let mut notes = Vec::new();
            for (measure, start) in part.measures.iter().zip(&starts) {
                for note in &measure.notes {
                    let key = match note.pitch() {
                        Some(pitch) => match u8::try_from(pitch.midi()) {
                            Ok(key) if key <= 127 => key,
                            _ => {
                                log::warn!(
                                    "part '{}': {} is outside the MIDI range, skipped",
                                    part.id,
                                    pitch
                                );
                                continue;
                            }
                        },
                        None if !note.is_rest() && percussion => UNPITCHED_KEY,
                        None => continue,
                    };
                    let start_tick = quarters_to_ticks(*start + note.onset, tpq);
                    let end_tick = quarters_to_ticks(*start + note.onset + note.duration, tpq);
                    notes.push(MidiNote {
                        start_tick,
                        dur_tick: end_tick.saturating_sub(start_tick),
                        key,
                        vel: DEFAULT_VELOCITY,
                    });
                }
            }

            TrackPlan {
                name: part.instrument.name.clone(),
                channel,
                program: if percussion { None } else { part.instrument.program },
                notes,
            }
        })
        .collect();

    Timeline {
        tpq,
        tempos,
        timesigs,
        tracks,
    }
}

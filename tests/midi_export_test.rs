// MIDI export parses back with midly; import recovers the parts

mod common;

use common::C_MAJOR_DUO;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use score_toolkit::converters::{midi_to_score, parse_musicxml, score_to_midi};
use score_toolkit::models::Sound;
use score_toolkit::{
    change_instrument, load_midi, ParseSettings, PartSelector, ScoreError, ScoreToolkit,
};

fn note_ons(track: &[midly::TrackEvent]) -> Vec<(u32, u8)> {
    let mut tick = 0;
    let mut out = Vec::new();
    for event in track {
        tick += event.delta.as_int();
        if let TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } = event.kind
        {
            if vel.as_int() > 0 {
                out.push((tick, key.as_int()));
            }
        }
    }
    out
}

#[test]
fn test_export_parses_back() {
    let score = parse_musicxml(C_MAJOR_DUO, &ParseSettings::default()).unwrap();
    let bytes = score_to_midi(&score, 480).expect("export should succeed");

    let smf = Smf::parse(&bytes).expect("midly should read the export");
    assert_eq!(smf.header.timing, Timing::Metrical(480.into()));
    // Conductor + one track per part
    assert_eq!(smf.tracks.len(), 3);

    let tempo = smf.tracks[0].iter().find_map(|e| match e.kind {
        TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
        _ => None,
    });
    // 100 BPM from <sound tempo>
    assert_eq!(tempo, Some(600_000));

    let piano = note_ons(&smf.tracks[1]);
    assert_eq!(piano.len(), 8);
    assert_eq!(piano[0], (0, 60));
    assert_eq!(piano[4], (4 * 480, 67));
    assert_eq!(piano[7], (7 * 480, 72));

    let bass = note_ons(&smf.tracks[2]);
    assert_eq!(bass, vec![(0, 48), (4 * 480, 43)]);
}

#[test]
fn test_program_and_channels() {
    let score = parse_musicxml(C_MAJOR_DUO, &ParseSettings::default()).unwrap();
    let score = change_instrument(score, &PartSelector::ByIndex(1), "drums").unwrap();
    let bytes = score_to_midi(&score, 96).unwrap();
    let smf = Smf::parse(&bytes).unwrap();

    let first_midi = |track: &[midly::TrackEvent]| {
        track.iter().find_map(|e| match e.kind {
            TrackEventKind::Midi { channel, message } => Some((channel.as_int(), message)),
            _ => None,
        })
    };

    // Piano: program 0 on channel 0
    assert!(matches!(
        first_midi(&smf.tracks[1]),
        Some((0, MidiMessage::ProgramChange { program })) if program.as_int() == 0
    ));
    // Percussion goes to channel 10 with no program change
    assert!(matches!(
        first_midi(&smf.tracks[2]),
        Some((9, MidiMessage::NoteOn { .. }))
    ));
}

#[test]
fn test_zero_tpq_rejected() {
    let score = parse_musicxml(C_MAJOR_DUO, &ParseSettings::default()).unwrap();
    assert!(matches!(score_to_midi(&score, 0), Err(ScoreError::Midi(_))));
}

#[test]
fn test_import_recovers_parts_and_pitches() {
    let score = parse_musicxml(C_MAJOR_DUO, &ParseSettings::default()).unwrap();
    let bytes = score_to_midi(&score, 480).unwrap();
    let imported = midi_to_score(&bytes).expect("import should succeed");

    assert_eq!(imported.parts.len(), score.parts.len());
    for (original, back) in score.parts.iter().zip(&imported.parts) {
        assert_eq!(back.instrument.name, original.instrument.name);
        assert_eq!(back.instrument.program, original.instrument.program);
        let midi = |part: &score_toolkit::Part| -> Vec<i16> {
            part.measures
                .iter()
                .flat_map(|m| m.notes.iter())
                .filter_map(|n| match n.sound {
                    Sound::Pitched(pitch) => Some(pitch.midi()),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(midi(back), midi(original));
    }
}

#[test]
fn test_load_midi_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("duo.mid");
    let score = parse_musicxml(C_MAJOR_DUO, &ParseSettings::default()).unwrap();
    std::fs::write(&path, score_to_midi(&score, 960).unwrap()).unwrap();

    let imported = load_midi(&path).unwrap();
    assert_eq!(imported.parts.len(), 2);

    let missing = ScoreToolkit::default().import_midi(dir.path().join("absent.mid"));
    assert!(matches!(missing, Err(ScoreError::Io { .. })));
}

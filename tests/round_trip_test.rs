// MusicXML round trip: parse → (instrument change) → write → parse

mod common;

use common::C_MAJOR_DUO;
use score_toolkit::converters::{generate_musicxml, parse_musicxml, write_musicxml};
use score_toolkit::models::{Step, TimeSignature};
use score_toolkit::{
    change_instrument, Instrument, Measure, Note, ParseSettings, Part, PartSelector, Pitch,
    Rational, Score,
};

fn parse(xml: &str) -> Score {
    parse_musicxml(xml, &ParseSettings::default()).expect("Failed to parse")
}

#[test]
fn test_parse_write_parse_is_identity() {
    let score = parse(C_MAJOR_DUO);
    let written = write_musicxml(&score).expect("write should succeed");
    assert_eq!(written, C_MAJOR_DUO);
    assert_eq!(parse(&written), score);
}

#[test]
fn test_instrument_change_round_trips() {
    let score = parse(C_MAJOR_DUO);
    let changed = change_instrument(score.clone(), &PartSelector::ByIndex(1), "cello").unwrap();

    let written = write_musicxml(&changed).unwrap();
    let reparsed = parse(&written);

    assert_eq!(reparsed, changed);
    assert_eq!(reparsed.parts[1].instrument, Instrument::resolve("cello"));
    assert_eq!(reparsed.parts[0], score.parts[0]);
}

#[test]
fn test_instrument_change_preserves_other_bytes() {
    let score = parse(C_MAJOR_DUO);
    let changed = change_instrument(score, &PartSelector::ByName("piano".into()), "Violin").unwrap();
    let written = write_musicxml(&changed).unwrap();

    // Everything outside the P1 <score-part> block is untouched
    let start = C_MAJOR_DUO.find("<score-part id=\"P1\">").unwrap();
    let end = C_MAJOR_DUO.find("<score-part id=\"P2\">").unwrap();
    assert!(written.starts_with(&C_MAJOR_DUO[..start]));
    assert!(written.ends_with(&C_MAJOR_DUO[end..]));

    assert!(written.contains("<part-name>Violin</part-name>"));
    assert!(written.contains("<part-abbreviation>Vln.</part-abbreviation>"));
    assert!(written.contains("<instrument-name>Violin</instrument-name>"));
    // GM program 40 is written 1-based
    assert!(written.contains("<midi-program>41</midi-program>"));
    assert!(written.contains("<midi-channel>1</midi-channel>"));
}

#[test]
fn test_built_score_round_trips_through_generated_markup() {
    let q = |n: i64, d: i64| Rational::new(n, d);
    let mut melody = Part::new("P1", Instrument::resolve("flute"));
    melody.push_measure(
        Measure::new()
            .with_time(TimeSignature::new(3, 4))
            .with_notes(vec![
                Note::pitched(Pitch::new(Step::A, 0, 5), q(0, 1), q(1, 3)),
                Note::pitched(Pitch::new(Step::B, -1, 5), q(1, 3), q(1, 3)),
                Note::pitched(Pitch::new(Step::A, 0, 5), q(2, 3), q(1, 3)),
                Note::rest(q(1, 1), q(1, 2)),
                Note::pitched(Pitch::new(Step::F, 1, 5), q(3, 2), q(3, 2)),
            ]),
    );
    let mut bass = Part::new("P2", Instrument::named("Theremin"));
    bass.push_measure(Measure::new().with_notes(vec![Note::pitched(
        Pitch::new(Step::D, 0, 3),
        q(0, 1),
        q(3, 1),
    )]));
    let score = Score::new(vec![melody, bass])
        .with_title("Generated")
        .with_composer("Nobody");

    let xml = generate_musicxml(&score).unwrap();
    assert!(xml.contains("<divisions>6</divisions>"));
    assert_eq!(parse(&xml), score);
}

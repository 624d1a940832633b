//! MusicXML writer
//!
//! Two strategies:
//! - the score still carries its source markup and only instrument metadata
//!   changed: splice the changes into the original text (see `splice`)
//! - otherwise: emit a fresh MusicXML 4.0 partwise document with quick-xml

use num_integer::lcm;
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashSet;

use super::splice::splice_instruments;
use crate::error::{Result, ScoreError};
use crate::models::{Instrument, Measure, Note, Part, Rational, Score, Sound};

const DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;

/// Serialize a Score to MusicXML text
pub fn write_musicxml(score: &Score) -> Result<String> {
    if let Some(source) = &score.source {
        if source.matches_content(score) {
            return splice_instruments(source, score);
        }
        log::info!("score content differs from its source markup; regenerating MusicXML");
    }
    generate_musicxml(score)
}

/// Emit a complete document from the model alone
pub fn generate_musicxml(score: &Score) -> Result<String> {
    validate_for_output(score)?;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_document(&mut writer, score).map_err(xml_error)?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| ScoreError::malformed(format!("generated MusicXML is not UTF-8: {}", e)))?;
    xml.push('\n');
    Ok(xml)
}

fn xml_error(e: quick_xml::Error) -> ScoreError {
    ScoreError::malformed(format!("MusicXML generation failed: {}", e))
}

/// Reject what the generated form cannot carry through a parse unchanged:
/// negative time, untrimmed or blank text, and values the parser clamps
fn validate_for_output(score: &Score) -> Result<()> {
    if score.parts.is_empty() {
        return Err(ScoreError::malformed("score has no parts"));
    }
    check_text("title", score.title.as_deref())?;
    check_text("composer", score.composer.as_deref())?;

    let zero = Rational::from_integer(0);
    let mut ids = HashSet::new();
    for part in &score.parts {
        if !ids.insert(part.id.as_str()) {
            return Err(ScoreError::malformed(format!("duplicate part id '{}'", part.id)));
        }
        validate_instrument(&part.id, &part.instrument)?;

        for measure in &part.measures {
            let context = format!("part '{}' measure {}", part.id, measure.number);
            if let Some(note) = measure.notes.iter().find(|n| n.onset < zero || n.duration < zero) {
                return Err(ScoreError::malformed(format!(
                    "{}: note with negative onset or duration ({} / {})",
                    context, note.onset, note.duration
                )));
            }
            if let Some(key) = &measure.key {
                if !(-7..=7).contains(&key.fifths) {
                    return Err(ScoreError::malformed(format!(
                        "{}: key signature with {} fifths",
                        context, key.fifths
                    )));
                }
            }
            if let Some(time) = &measure.time {
                if time.beat_type == 0 {
                    return Err(ScoreError::malformed(format!(
                        "{}: time signature with beat type 0",
                        context
                    )));
                }
            }
            if let Some(tempo) = measure.tempo {
                if !tempo.is_finite() || tempo <= 0.0 {
                    return Err(ScoreError::malformed(format!("{}: tempo {}", context, tempo)));
                }
            }
            let out_of_range = measure
                .notes
                .iter()
                .filter_map(|n| n.pitch())
                .find(|p| !(-9..=9).contains(&p.alter));
            if let Some(pitch) = out_of_range {
                return Err(ScoreError::malformed(format!(
                    "{}: {} has alter {}",
                    context,
                    pitch.step.as_str(),
                    pitch.alter
                )));
            }
        }
    }
    Ok(())
}

fn check_text(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(text) if text.trim().is_empty() || text.trim() != text => Err(ScoreError::malformed(
            format!("{} '{}' is blank or has surrounding whitespace", field, text),
        )),
        _ => Ok(()),
    }
}

fn validate_instrument(part_id: &str, instrument: &Instrument) -> Result<()> {
    let invalid = |what: &str| {
        Err(ScoreError::InvalidInstrument(format!("part '{}': {}", part_id, what)))
    };
    if instrument.name.trim().is_empty() {
        return invalid("blank instrument name");
    }
    if instrument.name.trim() != instrument.name {
        return invalid("instrument name has surrounding whitespace");
    }
    if let Some(abbreviation) = &instrument.abbreviation {
        if abbreviation.trim().is_empty() || abbreviation.trim() != abbreviation {
            return invalid("abbreviation is blank or has surrounding whitespace");
        }
    }
    if instrument.program.map_or(false, |p| p > 127) {
        return invalid("MIDI program above 127");
    }
    Ok(())
}

type XmlResult = quick_xml::Result<()>;

fn write_document(writer: &mut Writer<Vec<u8>>, score: &Score) -> XmlResult {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;

    writer
        .create_element("score-partwise")
        .with_attribute(("version", "4.0"))
        .write_inner_content::<_, quick_xml::Error>(|w| {
            if let Some(title) = &score.title {
                w.create_element("movement-title")
                    .write_text_content(BytesText::new(title))?;
            }
            if let Some(composer) = &score.composer {
                w.create_element("identification").write_inner_content::<_, quick_xml::Error>(|w| {
                    w.create_element("creator")
                        .with_attribute(("type", "composer"))
                        .write_text_content(BytesText::new(composer))?;
                    Ok(())
                })?;
            }

            w.create_element("part-list").write_inner_content::<_, quick_xml::Error>(|w| {
                for part in &score.parts {
                    write_score_part(w, &part.id, &part.instrument)?;
                }
                Ok(())
            })?;

            for part in &score.parts {
                write_part(w, part)?;
            }
            Ok(())
        })?;

    Ok(())
}

/// `<score-part>` with name, abbreviation and (when a program is set) instrument/MIDI entries
pub(crate) fn write_score_part(writer: &mut Writer<Vec<u8>>, id: &str, instrument: &Instrument) -> XmlResult {
    writer
        .create_element("score-part")
        .with_attribute(("id", id))
        .write_inner_content::<_, quick_xml::Error>(|w| {
            w.create_element("part-name")
                .write_text_content(BytesText::new(&instrument.name))?;
            if let Some(abbreviation) = &instrument.abbreviation {
                w.create_element("part-abbreviation")
                    .write_text_content(BytesText::new(abbreviation))?;
            }
            if let Some(program) = instrument.program {
                let instrument_id = format!("{}-I1", id);
                w.create_element("score-instrument")
                    .with_attribute(("id", instrument_id.as_str()))
                    .write_inner_content::<_, quick_xml::Error>(|w| {
                        w.create_element("instrument-name")
                            .write_text_content(BytesText::new(&instrument.name))?;
                        Ok(())
                    })?;
                w.create_element("midi-instrument")
                    .with_attribute(("id", instrument_id.as_str()))
                    .write_inner_content::<_, quick_xml::Error>(|w| {
                        let program = (program as u16 + 1).to_string();
                        w.create_element("midi-program")
                            .write_text_content(BytesText::new(&program))?;
                        Ok(())
                    })?;
            }
            Ok(())
        })?;
    Ok(())
}

/// Smallest divisions-per-quarter that expresses every onset and duration as an integer
fn divisions_for(part: &Part) -> i64 {
    part.measures
        .iter()
        .flat_map(|m| m.notes.iter())
        .flat_map(|n| [*n.onset.denom(), *n.duration.denom()])
        .fold(1, lcm)
}

fn to_divisions(value: Rational, divisions: i64) -> String {
    (value * Rational::from_integer(divisions)).to_integer().to_string()
}

fn write_part(writer: &mut Writer<Vec<u8>>, part: &Part) -> XmlResult {
    let divisions = divisions_for(part);

    writer
        .create_element("part")
        .with_attribute(("id", part.id.as_str()))
        .write_inner_content::<_, quick_xml::Error>(|w| {
            for (i, measure) in part.measures.iter().enumerate() {
                write_measure(w, measure, divisions, i == 0)?;
            }
            Ok(())
        })?;
    Ok(())
}

fn write_measure(writer: &mut Writer<Vec<u8>>, measure: &Measure, divisions: i64, first: bool) -> XmlResult {
    let number = if measure.number.is_empty() {
        measure.index.to_string()
    } else {
        measure.number.clone()
    };

    let mut element = writer
        .create_element("measure")
        .with_attribute(("number", number.as_str()));
    if measure.implicit {
        element = element.with_attribute(("implicit", "yes"));
    }

    element.write_inner_content::<_, quick_xml::Error>(|w| {
        if first || measure.key.is_some() || measure.time.is_some() {
            w.create_element("attributes").write_inner_content::<_, quick_xml::Error>(|w| {
                if first {
                    w.create_element("divisions")
                        .write_text_content(BytesText::new(&divisions.to_string()))?;
                }
                if let Some(key) = &measure.key {
                    w.create_element("key").write_inner_content::<_, quick_xml::Error>(|w| {
                        w.create_element("fifths")
                            .write_text_content(BytesText::new(&key.fifths.to_string()))?;
                        if let Some(mode) = key.mode {
                            w.create_element("mode")
                                .write_text_content(BytesText::new(mode.as_str()))?;
                        }
                        Ok(())
                    })?;
                }
                if let Some(time) = &measure.time {
                    w.create_element("time").write_inner_content::<_, quick_xml::Error>(|w| {
                        w.create_element("beats")
                            .write_text_content(BytesText::new(&time.beats.to_string()))?;
                        w.create_element("beat-type")
                            .write_text_content(BytesText::new(&time.beat_type.to_string()))?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }

        if let Some(tempo) = measure.tempo {
            w.create_element("sound")
                .with_attribute(("tempo", tempo.to_string().as_str()))
                .write_empty()?;
        }

        write_notes(w, &measure.notes, divisions)
    })?;
    Ok(())
}

/// Notes in order, using `<chord/>`, `<backup>` and `<forward>` so a parser
/// walking the cursor arrives at each stored onset
fn write_notes(writer: &mut Writer<Vec<u8>>, notes: &[Note], divisions: i64) -> XmlResult {
    let mut cursor = Rational::from_integer(0);
    let mut previous: Option<&Note> = None;

    for note in notes {
        let chord = previous
            .map(|prev| {
                prev.onset == note.onset && cursor > note.onset && !prev.is_rest() && !note.is_rest()
            })
            .unwrap_or(false);

        if !chord {
            if note.onset < cursor {
                write_move(writer, "backup", cursor - note.onset, divisions)?;
            } else if note.onset > cursor {
                write_move(writer, "forward", note.onset - cursor, divisions)?;
            }
        }

        write_note(writer, note, chord, divisions)?;

        if !chord {
            cursor = note.onset + note.duration;
            previous = Some(note);
        }
    }
    Ok(())
}

fn write_move(writer: &mut Writer<Vec<u8>>, tag: &str, amount: Rational, divisions: i64) -> XmlResult {
    writer.create_element(tag).write_inner_content::<_, quick_xml::Error>(|w| {
        w.create_element("duration")
            .write_text_content(BytesText::new(&to_divisions(amount, divisions)))?;
        Ok(())
    })?;
    Ok(())
}

fn write_note(writer: &mut Writer<Vec<u8>>, note: &Note, chord: bool, divisions: i64) -> XmlResult {
    writer.create_element("note").write_inner_content::<_, quick_xml::Error>(|w| {
        if chord {
            w.create_element("chord").write_empty()?;
        }
        match &note.sound {
            Sound::Pitched(pitch) => {
                w.create_element("pitch").write_inner_content::<_, quick_xml::Error>(|w| {
                    w.create_element("step")
                        .write_text_content(BytesText::new(pitch.step.as_str()))?;
                    if pitch.alter != 0 {
                        w.create_element("alter")
                            .write_text_content(BytesText::new(&pitch.alter.to_string()))?;
                    }
                    w.create_element("octave")
                        .write_text_content(BytesText::new(&pitch.octave.to_string()))?;
                    Ok(())
                })?;
            }
            Sound::Unpitched => {
                w.create_element("unpitched").write_empty()?;
            }
            Sound::Rest => {
                w.create_element("rest").write_empty()?;
            }
        }
        w.create_element("duration")
            .write_text_content(BytesText::new(&to_divisions(note.duration, divisions)))?;
        Ok(())
    })?;
    Ok(())
}

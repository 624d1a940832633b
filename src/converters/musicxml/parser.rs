//! MusicXML parser implementation
//!
//! Converts `score-partwise` documents into the Score model using roxmltree.
//! Structural problems (not XML, wrong root, no parts) are fatal; semantic
//! irregularities such as overfull measures are accepted as written.

use roxmltree::{Document as XmlDocument, Node, ParsingOptions};

use crate::analysis::stats::part_irregularities;
use crate::config::ParseSettings;
use crate::error::{Result, ScoreError};
use crate::models::{
    checked_sum, Baseline, ElementSpan, Instrument, KeySignature, Measure, Mode, Note, Part,
    PartSource, Pitch, Rational, Score, SourceDocument, Sound, Step, TimeSignature,
};

/// Parse MusicXML text into a Score
///
/// # Arguments
///
/// * `xml` - MusicXML document (`score-partwise`)
/// * `settings` - parser limits
///
/// # Example
///
/// ```ignore
/// let score = parse_musicxml(xml, &ParseSettings::default())?;
/// assert_eq!(score.parts[0].instrument.name, "Piano");
/// ```
pub fn parse_musicxml(xml: &str, settings: &ParseSettings) -> Result<Score> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    options.nodes_limit = settings.max_nodes;

    let doc = XmlDocument::parse_with_options(xml, options).map_err(|e| {
        let pos = e.pos();
        ScoreError::MalformedScore {
            reason: format!("XML parse error: {}", e),
            position: Some(format!("{}:{}", pos.row, pos.col)),
        }
    })?;

    let root = doc.root_element();
    match root.tag_name().name() {
        "score-partwise" => {}
        "score-timewise" => {
            return Err(ScoreError::MalformedScore {
                reason: "score-timewise documents are not supported (use score-partwise)".to_string(),
                position: Some(position_of(&doc, root)),
            })
        }
        other => {
            return Err(ScoreError::MalformedScore {
                reason: format!("expected <score-partwise> root element, found <{}>", other),
                position: Some(position_of(&doc, root)),
            })
        }
    }

    let part_list = child(root, "part-list").ok_or_else(|| ScoreError::MalformedScore {
        reason: "missing required element <part-list>".to_string(),
        position: Some(position_of(&doc, root)),
    })?;

    let mut parts = Vec::new();
    let mut sources = Vec::new();

    for part_node in children(root, "part") {
        let id = part_node.attribute("id").ok_or_else(|| ScoreError::MalformedScore {
            reason: "<part> without id attribute".to_string(),
            position: Some(position_of(&doc, part_node)),
        })?;

        let score_part = children(part_list, "score-part").find(|sp| sp.attribute("id") == Some(id));
        let (instrument, source) = match score_part {
            Some(sp) => parse_score_part(xml, sp, id),
            None => {
                log::warn!("part '{}' has no <score-part> entry; using its id as instrument name", id);
                let instrument = Instrument::named(id);
                (instrument.clone(), PartSource::new(id, instrument))
            }
        };

        let mut part = Part::new(id, instrument);
        parse_measures(&doc, part_node, &mut part, settings)?;

        parts.push(part);
        sources.push(source);
    }

    if parts.is_empty() {
        return Err(ScoreError::MalformedScore {
            reason: "document contains no <part> element".to_string(),
            position: Some(position_of(&doc, root)),
        });
    }

    let mut score = Score::new(parts);
    score.title = parse_title(root);
    score.composer = parse_composer(root);

    let mut source = SourceDocument::new(xml.to_string(), sources);
    source.part_list = Some(element_span(xml, part_list));
    source.baseline = Some(Baseline::capture(&score));
    score.source = Some(source);

    log::debug!(
        "parsed score: {} part(s), {} measure(s)",
        score.parts.len(),
        score.measure_count()
    );

    Ok(score)
}

/// `work/work-title`, falling back to `movement-title`
fn parse_title(root: Node) -> Option<String> {
    child(root, "work")
        .and_then(|work| child_text(work, "work-title"))
        .or_else(|| child_text(root, "movement-title"))
        .map(str::to_string)
}

fn parse_composer(root: Node) -> Option<String> {
    child(root, "identification")?
        .children()
        .filter(|n| n.has_tag_name("creator"))
        .find(|n| n.attribute("type") == Some("composer"))
        .and_then(|n| trimmed_text(n))
        .map(str::to_string)
}

/// Read instrument metadata from `<score-part>` and record where it lives
fn parse_score_part(xml: &str, score_part: Node, id: &str) -> (Instrument, PartSource) {
    let name_node = child(score_part, "part-name");
    let abbreviation_node = child(score_part, "part-abbreviation");
    let score_instrument = child(score_part, "score-instrument");
    let midi_instrument = child(score_part, "midi-instrument");
    let midi_program = midi_instrument.and_then(|mi| child(mi, "midi-program"));

    let name = name_node
        .and_then(trimmed_text)
        .map(str::to_string)
        .unwrap_or_else(|| {
            log::warn!("part '{}' has a blank <part-name>; using its id", id);
            id.to_string()
        });

    let abbreviation = abbreviation_node.and_then(trimmed_text).map(str::to_string);

    let program = midi_program.and_then(trimmed_text).and_then(|text| match text.parse::<u8>() {
        Ok(p @ 1..=128) => Some(p - 1),
        _ => {
            log::warn!("part '{}': ignoring out-of-range <midi-program> '{}'", id, text);
            None
        }
    });

    let instrument = Instrument {
        name,
        abbreviation,
        program,
    };

    let score_part_span = element_span(xml, score_part);
    let name_insert = score_part
        .children()
        .filter(|n| n.has_tag_name("identification") || n.has_tag_name("part-link"))
        .last()
        .map(|n| n.range().end)
        .or_else(|| score_part_span.content.as_ref().map(|c| c.start));

    let mut source = PartSource::new(id, instrument.clone());
    source.part_name = name_node.map(|n| element_span(xml, n));
    source.part_abbreviation = abbreviation_node.map(|n| element_span(xml, n));
    source.part_name_insert = name_insert;
    source.part_abbreviation_insert = child(score_part, "part-name-display")
        .or(name_node)
        .map(|n| n.range().end)
        .or(name_insert);
    source.score_part = Some(score_part_span);
    source.score_instrument = score_instrument.map(|n| element_span(xml, n));
    source.score_instrument_id = score_instrument.and_then(|n| n.attribute("id")).map(str::to_string);
    source.instrument_name = score_instrument
        .and_then(|si| child(si, "instrument-name"))
        .map(|n| element_span(xml, n));
    source.first_after_instruments = score_part
        .children()
        .find(|n| n.has_tag_name("player") || n.has_tag_name("midi-device") || n.has_tag_name("midi-instrument"))
        .map(|n| n.range().start);
    source.midi_instrument = midi_instrument.map(|n| element_span(xml, n));
    source.midi_program = midi_program.map(|n| element_span(xml, n));
    source.midi_program_insert = midi_instrument.and_then(|mi| {
        // midi-channel, midi-name and midi-bank precede midi-program
        mi.children()
            .filter(|n| n.has_tag_name("midi-channel") || n.has_tag_name("midi-name") || n.has_tag_name("midi-bank"))
            .last()
            .map(|n| n.range().end)
            .or_else(|| element_span(xml, mi).content.map(|c| c.start))
    });

    (instrument, source)
}

/// Per-part state that persists across measures
struct PartState<'s> {
    divisions: i64,
    settings: &'s ParseSettings,
}

fn parse_measures(
    doc: &XmlDocument,
    part_node: Node,
    part: &mut Part,
    settings: &ParseSettings,
) -> Result<()> {
    let mut state = PartState { divisions: 1, settings };

    for measure_node in children(part_node, "measure") {
        let mut measure = Measure::new();
        measure.number = measure_node.attribute("number").unwrap_or_default().to_string();
        measure.implicit = measure_node.attribute("implicit") == Some("yes");

        parse_measure_content(doc, measure_node, &mut measure, &mut state, &part.id)?;
        part.push_measure(measure);
    }

    report_irregular_measures(part);
    Ok(())
}

fn parse_measure_content(
    doc: &XmlDocument,
    measure_node: Node,
    measure: &mut Measure,
    state: &mut PartState,
    part_id: &str,
) -> Result<()> {
    let zero = Rational::from_integer(0);
    let mut cursor = zero;
    let mut last_onset: Option<Rational> = None;

    for node in measure_node.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "attributes" => parse_attributes(doc, node, measure, state, part_id)?,
            "sound" => read_tempo(node, measure),
            "direction" => {
                if let Some(sound) = child(node, "sound") {
                    read_tempo(sound, measure);
                }
            }
            "note" => {
                if child(node, "grace").is_some() {
                    // Grace notes take no metric time
                    continue;
                }

                let duration = read_duration(doc, node, state, part_id, measure)?;
                let sound = parse_sound(doc, node)?;
                let is_chord = child(node, "chord").is_some();

                let onset = match (is_chord, last_onset) {
                    (true, Some(onset)) => onset,
                    _ => cursor,
                };

                measure.notes.push(Note { sound, duration, onset });

                if !is_chord || last_onset.is_none() {
                    cursor = advance(doc, node, onset, duration)?;
                    last_onset = Some(onset);
                }
            }
            "backup" => {
                let amount = read_duration(doc, node, state, part_id, measure)?;
                cursor = advance(doc, node, cursor, -amount)?;
                if cursor < zero {
                    log::warn!(
                        "part '{}' measure {}: <backup> moves before the measure start; clamping",
                        part_id, measure.number
                    );
                    cursor = zero;
                }
            }
            "forward" => {
                let amount = read_duration(doc, node, state, part_id, measure)?;
                cursor = advance(doc, node, cursor, amount)?;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Move the measure cursor, failing when exact time no longer fits in 64 bits
fn advance(doc: &XmlDocument, node: Node, cursor: Rational, amount: Rational) -> Result<Rational> {
    checked_sum(cursor, amount).ok_or_else(|| ScoreError::MalformedScore {
        reason: format!("<{}> moves the measure position out of range", node.tag_name().name()),
        position: Some(position_of(doc, node)),
    })
}

fn parse_attributes(
    doc: &XmlDocument,
    node: Node,
    measure: &mut Measure,
    state: &mut PartState,
    part_id: &str,
) -> Result<()> {
    if let Some(text) = child_text(node, "divisions") {
        match text.parse::<i64>() {
            Ok(d) if d > state.settings.max_divisions => {
                return Err(ScoreError::MalformedScore {
                    reason: format!(
                        "<divisions> {} exceeds the limit of {}",
                        d, state.settings.max_divisions
                    ),
                    position: Some(position_of(doc, node)),
                })
            }
            Ok(d) if d > 0 => state.divisions = d,
            _ => log::warn!("part '{}': ignoring invalid <divisions> '{}'", part_id, text),
        }
    }

    if let Some(key) = child(node, "key") {
        if let Some(fifths) = child_text(key, "fifths") {
            match fifths.parse::<i8>() {
                Ok(fifths) => {
                    measure.key = Some(KeySignature {
                        fifths: fifths.clamp(-7, 7),
                        mode: child_text(key, "mode").and_then(|m| m.parse::<Mode>().ok()),
                    });
                }
                Err(_) => log::warn!("part '{}': ignoring invalid <fifths> '{}'", part_id, fifths),
            }
        }
    }

    if let Some(time) = child(node, "time") {
        if child(time, "senza-misura").is_some() {
            return Ok(());
        }
        let beats = child_text(time, "beats").and_then(parse_beats);
        let beat_type = child_text(time, "beat-type").and_then(|t| t.parse::<u32>().ok());
        match (beats, beat_type) {
            (Some(beats), Some(beat_type)) if beat_type > 0 => {
                measure.time = Some(TimeSignature::new(beats, beat_type));
            }
            _ => log::warn!("part '{}' measure {}: unreadable <time>", part_id, measure.number),
        }
    }
    Ok(())
}

/// `<beats>` may be composite ("3+2")
fn parse_beats(text: &str) -> Option<u32> {
    text.split('+')
        .try_fold(0u32, |total, part| total.checked_add(part.trim().parse::<u32>().ok()?))
}

fn read_tempo(sound: Node, measure: &mut Measure) {
    if measure.tempo.is_some() {
        return;
    }
    if let Some(tempo) = sound.attribute("tempo").and_then(|t| t.trim().parse::<f64>().ok()) {
        if tempo > 0.0 {
            measure.tempo = Some(tempo);
        }
    }
}

/// `<duration>` child converted from divisions to quarter notes
///
/// Unreadable text counts as zero; a value beyond `max_duration_quarters` is an error.
fn read_duration(
    doc: &XmlDocument,
    node: Node,
    state: &PartState,
    part_id: &str,
    measure: &Measure,
) -> Result<Rational> {
    let limit = state.settings.max_duration_quarters;
    match child_text(node, "duration") {
        Some(text) => match text.parse::<i64>() {
            Ok(divs) if divs >= 0 => {
                let duration = Rational::new(divs, state.divisions);
                if duration > Rational::from_integer(limit) {
                    return Err(ScoreError::MalformedScore {
                        reason: format!(
                            "<duration> {} at divisions {} exceeds {} quarter notes",
                            divs, state.divisions, limit
                        ),
                        position: Some(position_of(doc, node)),
                    });
                }
                Ok(duration)
            }
            _ => {
                log::warn!(
                    "part '{}' measure {}: invalid <duration> '{}', treating as zero",
                    part_id, measure.number, text
                );
                Ok(Rational::from_integer(0))
            }
        },
        None => {
            log::warn!(
                "part '{}' measure {}: <{}> without <duration>, treating as zero",
                part_id,
                measure.number,
                node.tag_name().name()
            );
            Ok(Rational::from_integer(0))
        }
    }
}

fn parse_sound(doc: &XmlDocument, note: Node) -> Result<Sound> {
    if child(note, "rest").is_some() {
        return Ok(Sound::Rest);
    }
    if child(note, "unpitched").is_some() {
        return Ok(Sound::Unpitched);
    }

    let pitch = child(note, "pitch").ok_or_else(|| ScoreError::MalformedScore {
        reason: "<note> without <pitch>, <unpitched> or <rest>".to_string(),
        position: Some(position_of(doc, note)),
    })?;

    let step = child_text(pitch, "step")
        .unwrap_or_default()
        .parse::<Step>()
        .map_err(|e| ScoreError::MalformedScore {
            reason: e,
            position: Some(position_of(doc, pitch)),
        })?;

    let alter = match child_text(pitch, "alter") {
        Some(text) => match text.parse::<f64>() {
            Ok(value) => {
                if value.fract() != 0.0 {
                    log::warn!("microtonal <alter> {} rounded to the nearest semitone", value);
                }
                value.round().clamp(-9.0, 9.0) as i8
            }
            Err(_) => {
                log::warn!("invalid <alter> '{}', treating as natural", text);
                0
            }
        },
        None => 0,
    };

    let octave = match child_text(pitch, "octave").map(|t| t.parse::<i8>()) {
        Some(Ok(octave)) => octave,
        _ => {
            log::warn!("missing or invalid <octave> at {}, assuming 4", position_of(doc, pitch));
            4
        }
    };

    Ok(Sound::Pitched(Pitch::new(step, alter, octave)))
}

/// Log measures whose content does not fill the declared time signature
fn report_irregular_measures(part: &Part) {
    for irregular in part_irregularities(part) {
        log::warn!(
            "part '{}' measure {}: content lasts {} quarters, time signature expects {}",
            irregular.part_id,
            irregular.measure_number,
            irregular.actual,
            irregular.expected
        );
    }
}

// ============================================================================
// Node helpers
// ============================================================================

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.has_tag_name(name))
}

fn trimmed_text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(trimmed_text)
}

fn position_of(doc: &XmlDocument, node: Node) -> String {
    let pos = doc.text_pos_at(node.range().start);
    format!("{}:{}", pos.row, pos.col)
}

/// Byte span of an element, including its content range unless self-closing
fn element_span(xml: &str, node: Node) -> ElementSpan {
    let range = node.range();
    let raw = &xml[range.clone()];

    let content = if raw.ends_with("/>") && !node.has_children() {
        None
    } else {
        raw.rfind("</").map(|offset| {
            let end = range.start + offset;
            let start = node.first_child().map(|c| c.range().start).unwrap_or(end);
            start..end
        })
    };

    ElementSpan { range, content }
}

//! Byte-preserving instrument rewrites
//!
//! Each retargeted part contributes a small set of edits against the original
//! text: replace the text of `part-name`, `part-abbreviation`,
//! `instrument-name` and `midi-program`, or insert those elements where the
//! schema places them when they were absent. Everything outside the edits is
//! copied verbatim.

use quick_xml::escape::escape;
use quick_xml::Writer;
use std::ops::Range;

use super::writer::write_score_part;
use crate::error::{Result, ScoreError};
use crate::models::{ElementSpan, Instrument, PartSource, Score, SourceDocument};

/// Replace `range` with `text`; an empty range is an insertion
#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    text: String,
}

impl Edit {
    fn insert(at: usize, text: String) -> Self {
        Self { range: at..at, text }
    }

    fn replace(range: Range<usize>, text: String) -> Self {
        Self { range, text }
    }

    fn remove(range: Range<usize>) -> Self {
        Self {
            range,
            text: String::new(),
        }
    }
}

/// Write `score` by splicing changed instruments into `source.text`
pub fn splice_instruments(source: &SourceDocument, score: &Score) -> Result<String> {
    let mut edits = Vec::new();
    let mut new_list_entries = String::new();

    for part in &score.parts {
        let part_source = source.part(&part.id).ok_or_else(|| {
            ScoreError::malformed(format!("no source record for part '{}'", part.id))
        })?;

        if part_source.original == part.instrument {
            continue;
        }

        log::debug!(
            "part '{}': '{}' -> '{}'",
            part.id,
            part_source.original.name,
            part.instrument.name
        );

        match &part_source.score_part {
            Some(span) if !span.is_self_closing() => {
                plan_targeted_edits(&source.text, part_source, span, &part.instrument, &mut edits);
            }
            Some(span) => {
                edits.push(Edit::replace(
                    span.range.clone(),
                    score_part_snippet(&part.id, &part.instrument)?,
                ));
            }
            None => new_list_entries.push_str(&score_part_snippet(&part.id, &part.instrument)?),
        }
    }

    if !new_list_entries.is_empty() {
        let list = source
            .part_list
            .as_ref()
            .ok_or_else(|| ScoreError::malformed("source has no <part-list> to extend"))?;
        edits.push(match &list.content {
            Some(content) => Edit::insert(content.end, new_list_entries),
            None => Edit::replace(
                list.range.clone(),
                format!("{}>{}</part-list>", open_tag(&source.text, list), new_list_entries),
            ),
        });
    }

    apply_edits(&source.text, edits)
}

fn plan_targeted_edits(
    text: &str,
    ps: &PartSource,
    score_part: &ElementSpan,
    new: &Instrument,
    edits: &mut Vec<Edit>,
) {
    let Some(content) = &score_part.content else {
        return;
    };
    let old = &ps.original;
    let name_changed = new.name != old.name;

    if name_changed {
        match &ps.part_name {
            Some(span) => edits.push(set_text(text, span, "part-name", &new.name)),
            None => edits.push(Edit::insert(
                ps.part_name_insert.unwrap_or(content.start),
                element("part-name", &new.name),
            )),
        }
    }

    if new.abbreviation != old.abbreviation {
        let after_name = ps.part_abbreviation_insert.unwrap_or(content.start);
        match (&ps.part_abbreviation, &new.abbreviation) {
            (Some(span), Some(abbreviation)) => {
                edits.push(set_text(text, span, "part-abbreviation", abbreviation))
            }
            (Some(span), None) => edits.push(Edit::remove(span.range.clone())),
            (None, Some(abbreviation)) => {
                edits.push(Edit::insert(after_name, element("part-abbreviation", abbreviation)))
            }
            (None, None) => {}
        }
    }

    if name_changed {
        if let Some(score_instrument) = &ps.score_instrument {
            match (&ps.instrument_name, &score_instrument.content) {
                (Some(span), _) => edits.push(set_text(text, span, "instrument-name", &new.name)),
                (None, Some(inner)) => {
                    edits.push(Edit::insert(inner.start, element("instrument-name", &new.name)))
                }
                (None, None) => edits.push(Edit::replace(
                    score_instrument.range.clone(),
                    format!(
                        "{}>{}</score-instrument>",
                        open_tag(text, score_instrument),
                        element("instrument-name", &new.name)
                    ),
                )),
            }
        }
    }

    if new.program != old.program {
        plan_program_edit(text, ps, content, new, edits);
    }
}

fn plan_program_edit(
    text: &str,
    ps: &PartSource,
    content: &Range<usize>,
    new: &Instrument,
    edits: &mut Vec<Edit>,
) {
    match (&ps.midi_program, new.program) {
        (Some(span), Some(program)) => {
            edits.push(set_text(text, span, "midi-program", &midi_program_text(program)))
        }
        (Some(span), None) => edits.push(Edit::remove(span.range.clone())),
        (None, None) => {}
        (None, Some(program)) => {
            let program_element = element("midi-program", &midi_program_text(program));

            if let Some(midi_instrument) = &ps.midi_instrument {
                match (&midi_instrument.content, ps.midi_program_insert) {
                    (Some(_), Some(at)) => edits.push(Edit::insert(at, program_element)),
                    _ => edits.push(Edit::replace(
                        midi_instrument.range.clone(),
                        format!(
                            "{}>{}</midi-instrument>",
                            open_tag(text, midi_instrument),
                            program_element
                        ),
                    )),
                }
                return;
            }

            // No MIDI entry yet; it must reference a score-instrument
            let instrument_id = match &ps.score_instrument {
                Some(_) => ps
                    .score_instrument_id
                    .clone()
                    .unwrap_or_else(|| format!("{}-I1", ps.id)),
                None => {
                    let id = format!("{}-I1", ps.id);
                    let at = ps.first_after_instruments.unwrap_or(content.end);
                    edits.push(Edit::insert(
                        at,
                        format!(
                            "<score-instrument id=\"{}\">{}</score-instrument>",
                            escape(id.as_str()),
                            element("instrument-name", &new.name)
                        ),
                    ));
                    id
                }
            };
            edits.push(Edit::insert(
                content.end,
                format!(
                    "<midi-instrument id=\"{}\">{}</midi-instrument>",
                    escape(instrument_id.as_str()),
                    program_element
                ),
            ));
        }
    }
}

/// MusicXML counts programs from 1
fn midi_program_text(program: u8) -> String {
    (program as u16 + 1).to_string()
}

fn element(tag: &str, value: &str) -> String {
    format!("<{tag}>{}</{tag}>", escape(value))
}

/// Replace an element's text, keeping its start-tag attributes
fn set_text(text: &str, span: &ElementSpan, tag: &str, value: &str) -> Edit {
    match &span.content {
        Some(content) => Edit::replace(content.clone(), escape(value).into_owned()),
        None => Edit::replace(
            span.range.clone(),
            format!("{}>{}</{}>", open_tag(text, span), escape(value), tag),
        ),
    }
}

/// Start tag of a self-closing element without its closing `/>`
fn open_tag<'a>(text: &'a str, span: &ElementSpan) -> &'a str {
    text[span.range.clone()]
        .trim_end_matches("/>")
        .trim_end_matches('>')
        .trim_end()
}

fn score_part_snippet(id: &str, instrument: &Instrument) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_score_part(&mut writer, id, instrument)
        .map_err(|e| ScoreError::malformed(format!("score-part generation failed: {}", e)))?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| ScoreError::malformed(format!("score-part is not UTF-8: {}", e)))
}

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> Result<String> {
    // Insertions go ahead of a replacement starting at the same offset
    edits.sort_by_key(|e| (e.range.start, !e.range.is_empty()));

    let mut out = String::with_capacity(text.len() + 256);
    let mut pos = 0;
    for edit in edits {
        if edit.range.start < pos {
            return Err(ScoreError::malformed(format!(
                "overlapping instrument edits at byte {}",
                edit.range.start
            )));
        }
        out.push_str(&text[pos..edit.range.start]);
        out.push_str(&edit.text);
        pos = edit.range.end;
    }
    out.push_str(&text[pos..]);
    Ok(out)
}

//! Underline annotation: re-locate indexed lines in a live PDF and stroke
//! one horizontal segment beneath each.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::parser::backend::page_height_of;
use crate::select;
use crate::types::Attestation;
use crate::AttestError;

/// Vertical nudge in points so the stroke sits just under the glyphs rather
/// than through their baseline row.
const TEXT_SIZE_OFFSET: f64 = 3.0;

/// Fixed right edge of every underline, in points.
const UNDERLINE_RIGHT_EDGE: f64 = 540.0;

/// Depth-first search for an attestation by id, recursing into `children`.
///
/// First match wins. Absence is not an error; the caller simply draws
/// nothing for that id.
pub fn find_attestation<'a>(id: &str, index: &'a [Attestation]) -> Option<&'a Attestation> {
    for node in index {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_attestation(id, &node.children) {
            return Some(found);
        }
    }
    None
}

/// Draw underlines for the requested attestation ids onto a copy of the
/// document and return the modified bytes.
///
/// Best effort by design: ids absent from the index are skipped, and a line
/// pointing at a page the live document does not have draws nothing. The
/// result is a pure function of the inputs, so re-running with identical
/// inputs yields byte-identical output.
pub fn annotate_document(
    pdf: &[u8],
    index: &[Attestation],
    ids: &[String],
) -> Result<Vec<u8>, AttestError> {
    let mut doc = Document::load_mem(pdf).map_err(|e| AttestError::Parse(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(AttestError::Encrypted);
    }

    let pages = doc.get_pages();

    // Per-page stroke list: (start x, device y). Collected first so each
    // page gets exactly one appended content stream.
    let mut strokes: BTreeMap<u32, Vec<(f64, f64)>> = BTreeMap::new();

    for id in ids {
        let Some(attestation) = find_attestation(id, index) else {
            log::debug!("attestation {} not in index, skipping", id);
            continue;
        };

        for line in select::unique_lines(attestation) {
            let Some(&page_id) = pages.get(&line.page) else {
                continue;
            };
            let Some(start_x) = select::start_position(attestation, line.num) else {
                continue;
            };

            let height = page_height_of(&doc, page_id)?;
            // Row coordinates are top-origin; PDF device space is
            // bottom-left.
            let y = height - line.num as f64 + TEXT_SIZE_OFFSET;
            strokes.entry(line.page).or_default().push((start_x as f64, y));
        }
    }

    for (page_number, segments) in &strokes {
        if let Some(&page_id) = pages.get(page_number) {
            let stream_id = build_stroke_stream(&mut doc, segments)?;
            append_page_content(&mut doc, page_id, stream_id)?;
        }
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| AttestError::Parse(format!("cannot save annotated document: {}", e)))?;

    Ok(output)
}

/// Encode one page's underline segments as a content stream object.
fn build_stroke_stream(
    doc: &mut Document,
    segments: &[(f64, f64)],
) -> Result<ObjectId, AttestError> {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("w", vec![Object::Real(1.0)]),
    ];
    for &(x, y) in segments {
        operations.push(Operation::new(
            "m",
            vec![Object::Real(x as f32), Object::Real(y as f32)],
        ));
        operations.push(Operation::new(
            "l",
            vec![
                Object::Real(UNDERLINE_RIGHT_EDGE as f32),
                Object::Real(y as f32),
            ],
        ));
        operations.push(Operation::new("S", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));

    let encoded = Content { operations }
        .encode()
        .map_err(|e| AttestError::Parse(format!("cannot encode stroke stream: {}", e)))?;

    Ok(doc.add_object(Stream::new(Dictionary::new(), encoded)))
}

/// Append a content stream reference to a page, normalizing `Contents` to an
/// array when it was a single reference.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    stream_id: ObjectId,
) -> Result<(), AttestError> {
    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| AttestError::Parse(format!("cannot get page object: {}", e)))?;
    let dict = page
        .as_dict_mut()
        .map_err(|e| AttestError::Parse(format!("page object is not a dictionary: {}", e)))?;

    match dict.get_mut(b"Contents") {
        Ok(Object::Array(arr)) => arr.push(Object::Reference(stream_id)),
        Ok(existing @ Object::Reference(_)) => {
            let first = existing.clone();
            *existing = Object::Array(vec![first, Object::Reference(stream_id)]);
        }
        _ => dict.set("Contents", Object::Reference(stream_id)),
    }

    Ok(())
}

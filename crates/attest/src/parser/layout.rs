//! Content-stream text extraction.
//!
//! Implements a simplified PDF text-rendering state machine that walks a
//! page's operators and emits [`TextRun`]s in stream order. Run order is
//! significant downstream: boundary detection is stateful and must see runs
//! exactly as they appear in the file.
//!
//! Extracted coordinates are flipped to a top-left origin (`y` grows
//! downward), matching the convention the index format and the margin
//! filters are written against.

use super::backend::{number_value, ContentOp, PageId, PdfBackend, PdfValue};
use crate::{AttestError, PageText, TextRun};

/// Approximate character width as a fraction of font size, used to advance
/// the text matrix when no glyph metrics are available.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// The identity 2x3 text matrix: [a, b, c, d, tx, ty].
const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Mutable state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource key (the `/F1`-style name).
    font_key: Vec<u8>,
    /// Resolved base-font name for the current font.
    font_name: String,
    font_size: f32,
    /// Elements [a, b, c, d, tx, ty] of the current text matrix.
    text_matrix: [f32; 6],
    /// Text line matrix -- set by BT and updated by Td/TD/T*/Tm.
    line_matrix: [f32; 6],
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn x(&self) -> f32 {
        self.text_matrix[4]
    }

    fn y(&self) -> f32 {
        self.text_matrix[5]
    }

    /// Effective font size accounting for the text matrix vertical scale.
    fn effective_font_size(&self) -> f32 {
        let scale = (self.text_matrix[1].powi(2) + self.text_matrix[3].powi(2)).sqrt();
        (self.font_size * scale).abs()
    }

    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    /// Advance past `text` and return the applied displacement.
    fn advance_after_show(&mut self, text: &str) -> f32 {
        let mut total_dx: f32 = 0.0;
        for ch in text.chars() {
            let char_w = self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale;
            total_dx += char_w + self.char_spacing;
            if ch == ' ' {
                total_dx += self.word_spacing;
            }
        }
        self.advance_x(total_dx);
        total_dx
    }
}

/// Decode a single [`PdfValue::Str`] operand using the backend's font-aware
/// decoder.
fn decode_string(
    val: &PdfValue,
    backend: &dyn PdfBackend,
    page_id: PageId,
    font_key: &[u8],
) -> String {
    match val {
        PdfValue::Str(bytes) => {
            let decoded = backend.decode_text(page_id, font_key, bytes);
            if decoded.is_empty() {
                super::backend::decode_text_simple(bytes)
            } else {
                decoded
            }
        }
        _ => String::new(),
    }
}

/// Walk one page's content stream and produce its [`TextRun`]s.
///
/// Handles the text operators `BT`/`ET`, `Tf`, `Tm`, `Td`/`TD`/`T*`/`TL`,
/// `Tc`/`Tw`/`Tz`/`Ts`, and the show operators `Tj`/`TJ`/`'`/`"`. All other
/// operators are ignored. `page_height` is used to flip `y` to a top-left
/// origin.
pub fn extract_page_runs(
    backend: &dyn PdfBackend,
    page_id: PageId,
    page_height: f64,
) -> Result<Vec<TextRun>, AttestError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_font_names(page_id);

    let mut state = TextState::default();
    let mut runs: Vec<TextRun> = Vec::new();

    for op in &ops {
        match op.operator.as_str() {
            "BT" => {
                state.text_matrix = IDENTITY_MATRIX;
                state.line_matrix = IDENTITY_MATRIX;
            }
            "ET" => {
                // Font state is kept across text objects; some producers
                // reuse the font set earlier.
            }

            "Tf" => {
                if op.operands.len() >= 2 {
                    let key = match &op.operands[0] {
                        PdfValue::Name(n) => n.clone(),
                        PdfValue::Str(s) => s.clone(),
                        _ => continue,
                    };
                    state.font_size = number_value(&op.operands[1]).unwrap_or(0.0);
                    state.font_name = fonts
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| String::from_utf8_lossy(&key).into_owned());
                    state.font_key = key;
                }
            }

            "Tm" => {
                let vals: Vec<f32> = op
                    .operands
                    .iter()
                    .take(6)
                    .filter_map(number_value)
                    .collect();
                if vals.len() == 6 {
                    state.text_matrix = [vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]];
                    state.line_matrix = state.text_matrix;
                }
            }
            "Td" => {
                if op.operands.len() >= 2 {
                    let tx = number_value(&op.operands[0]).unwrap_or(0.0);
                    let ty = number_value(&op.operands[1]).unwrap_or(0.0);
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                // TD is equivalent to: -ty TL ; tx ty Td
                if op.operands.len() >= 2 {
                    let tx = number_value(&op.operands[0]).unwrap_or(0.0);
                    let ty = number_value(&op.operands[1]).unwrap_or(0.0);
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => {
                state.translate_line(0.0, -state.leading);
            }
            "TL" => {
                if let Some(v) = op.operands.first().and_then(number_value) {
                    state.leading = v;
                }
            }

            "Tc" => {
                if let Some(v) = op.operands.first().and_then(number_value) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = op.operands.first().and_then(number_value) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = op.operands.first().and_then(number_value) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = op.operands.first().and_then(number_value) {
                    state.text_rise = v;
                }
            }

            "Tj" => {
                if let Some(first) = op.operands.first() {
                    emit_run(first, backend, page_id, page_height, &mut state, &mut runs);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = op.operands.first() {
                    emit_tj_array(arr, backend, page_id, page_height, &mut state, &mut runs);
                }
            }
            "'" => {
                state.translate_line(0.0, -state.leading);
                if let Some(first) = op.operands.first() {
                    emit_run(first, backend, page_id, page_height, &mut state, &mut runs);
                }
            }
            "\"" => {
                // " aw ac string  =>  set Tw, Tc, T*, Tj
                if op.operands.len() >= 3 {
                    if let Some(aw) = number_value(&op.operands[0]) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = number_value(&op.operands[1]) {
                        state.char_spacing = ac;
                    }
                    state.translate_line(0.0, -state.leading);
                    emit_run(
                        &op.operands[2],
                        backend,
                        page_id,
                        page_height,
                        &mut state,
                        &mut runs,
                    );
                }
            }

            _ => { /* Ignore non-text operators */ }
        }
    }

    Ok(runs)
}

/// Decode an operand, push a [`TextRun`] at the current position, and
/// advance. Shared by `Tj`, `'`, and `"`.
fn emit_run(
    operand: &PdfValue,
    backend: &dyn PdfBackend,
    page_id: PageId,
    page_height: f64,
    state: &mut TextState,
    runs: &mut Vec<TextRun>,
) {
    let text = decode_string(operand, backend, page_id, &state.font_key);
    if text.is_empty() {
        return;
    }
    push_run(&text, state.x(), state, page_height, runs);
    state.advance_after_show(&text);
}

/// Process a `TJ` array: strings to render interleaved with numeric kerning
/// adjustments (thousandths of a text-space unit). Emits one run per array,
/// with a space inserted where a kerning gap is wide enough to read as a
/// word boundary.
fn emit_tj_array(
    arr: &[PdfValue],
    backend: &dyn PdfBackend,
    page_id: PageId,
    page_height: f64,
    state: &mut TextState,
    runs: &mut Vec<TextRun>,
) {
    let mut buf = String::new();
    let mut run_x = state.x();

    for elem in arr {
        match elem {
            PdfValue::Str(_) => {
                let fragment = decode_string(elem, backend, page_id, &state.font_key);
                if buf.is_empty() {
                    run_x = state.x();
                }
                buf.push_str(&fragment);
                state.advance_after_show(&fragment);
            }
            val => {
                // Negative adjustment moves right, positive moves left.
                if let Some(adj) = number_value(val) {
                    let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
                    let gap_threshold =
                        state.font_size * APPROX_CHAR_WIDTH_RATIO * state.horiz_scale * 0.3;

                    if dx > gap_threshold && !buf.is_empty() {
                        buf.push(' ');
                    }

                    state.advance_x(dx);
                }
            }
        }
    }

    let trimmed = buf.trim_end();
    if !trimmed.is_empty() {
        push_run(trimmed, run_x, state, page_height, runs);
    }
}

fn push_run(text: &str, x: f32, state: &TextState, page_height: f64, runs: &mut Vec<TextRun>) {
    let device_y = (state.y() + state.text_rise) as f64;
    runs.push(TextRun {
        text: text.to_string(),
        x: x as f64,
        // Flip to top-left origin.
        y: page_height - device_y,
        height: state.effective_font_size() as f64,
        font: state.font_name.clone(),
    });
}

/// Extract positioned text from every page of the document, in page order.
pub fn extract_document(backend: &dyn PdfBackend) -> Result<Vec<PageText>, AttestError> {
    let page_map = backend.pages();
    let mut pages: Vec<PageText> = Vec::with_capacity(page_map.len());

    for (&number, &page_id) in &page_map {
        let height = backend.page_height(page_id)?;
        let runs = extract_page_runs(backend, page_id, height)?;
        pages.push(PageText {
            number,
            height,
            runs,
        });
    }

    Ok(pages)
}

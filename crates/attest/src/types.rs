use serde::{Deserialize, Serialize};

/// A single run of text at a specific position on one page, as produced by
/// the extraction layer.
///
/// `y` is measured from the top edge of the page (text-extraction
/// convention); the extraction layer performs the flip from PDF device
/// space. `height` is the effective font size and doubles as the font-size
/// proxy used by the margin filters.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub font: String,
}

/// One page's geometry plus its ordered run stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    /// Page height in points, used for the document-global Y computation.
    pub height: f64,
    pub runs: Vec<TextRun>,
}

/// Document-global vertical coordinate: page heights accumulate so positions
/// on different pages stay comparable.
pub fn absolute_y(page_number: u32, page_height: f64, y: f64) -> i64 {
    ((page_number - 1) as f64 * page_height + y).round() as i64
}

/// A content line collected into an attestation.
///
/// Field names match the persisted index format: `{str, num, size, x, font,
/// page}` with `num` and `x` rounded, `size` the raw font height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub str: String,
    pub num: i64,
    pub size: f64,
    pub x: i64,
    pub font: String,
    pub page: u32,
}

/// A fully bounded attestation: one semantically delimited section of a
/// certificate document, spanning from its header line to the next header
/// (exclusive).
///
/// Created during indexing, persisted as camelCase JSON, and read back
/// read-only during annotation. `children` is always empty in indexer
/// output but is honored on the way back in so tree-shaped index files can
/// be traversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    pub name: String,
    pub start_y: i64,
    pub end_y: i64,
    pub start_page: u32,
    pub end_page: u32,
    pub absolute_y: i64,
    pub absolute_end_y: i64,
    pub lines: Vec<Line>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Attestation>,
}

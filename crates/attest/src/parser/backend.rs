use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use crate::AttestError;

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// A simplified, lopdf-independent representation of a PDF value.
///
/// Decouples the content-stream walk from the concrete `lopdf::Object` type
/// so the extraction state machine can be tested on synthetic operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn number_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// References are preserved as `PdfValue::Reference`. Stream dictionaries
/// are converted but the raw stream bytes are discarded.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => {
            let entries = dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect();
            PdfValue::Dict(entries)
        }
        lopdf::Object::Stream(stream) => {
            let entries = stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect();
            PdfValue::Dict(entries)
        }
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// Handles three cases in order: UTF-16BE with BOM, valid UTF-8, and a
/// Latin-1 fallback where each byte maps to its code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let code_units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|chunk| {
                if chunk.len() == 2 {
                    Some(u16::from_be_bytes([chunk[0], chunk[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// Exists so the extraction state machine and everything downstream can be
/// exercised against mock implementations without real PDF bytes.
pub trait PdfBackend {
    /// Mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Page height in points, from the MediaBox.
    fn page_height(&self, page: PageId) -> Result<f64, AttestError>;

    /// Raw (possibly compressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, AttestError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, AttestError>;

    /// Resource-key to base-font-name mapping for a page's fonts.
    fn page_font_names(&self, page: PageId) -> BTreeMap<Vec<u8>, String>;

    /// Decode raw string bytes from a text-showing operator, using any
    /// encoding hints the backend can find for the given page and font.
    fn decode_text(&self, page: PageId, font_key: &[u8], bytes: &[u8]) -> String;
}

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, AttestError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| AttestError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(AttestError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Look up the encoding name for a font on a page, if declared.
    fn font_encoding_name(&self, page: PageId, font_key: &[u8]) -> Option<String> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        let font_dict = fonts.get(font_key)?;
        let enc_obj = font_dict.get(b"Encoding").ok()?;
        match enc_obj {
            lopdf::Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_height(&self, page: PageId) -> Result<f64, AttestError> {
        page_height_of(&self.doc, page)
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, AttestError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| AttestError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, AttestError> {
        let content = Content::decode(data)
            .map_err(|e| AttestError::Parse(format!("content stream decode error: {}", e)))?;

        let ops = content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect();

        Ok(ops)
    }

    fn page_font_names(&self, page: PageId) -> BTreeMap<Vec<u8>, String> {
        let mut names = BTreeMap::new();
        let fonts = match self.doc.get_page_fonts(page) {
            Ok(fonts) => fonts,
            Err(_) => return names,
        };

        for (key, dict) in &fonts {
            let base = dict
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_else(|| String::from_utf8_lossy(key).into_owned());
            names.insert(key.clone(), base);
        }

        names
    }

    fn decode_text(&self, page: PageId, font_key: &[u8], bytes: &[u8]) -> String {
        // Identity-H / Identity-V fonts typically use 2-byte CID codes that
        // map to Unicode; try UTF-16BE decoding for those.
        if let Some(enc_name) = self.font_encoding_name(page, font_key) {
            if enc_name.contains("Identity") && bytes.len() >= 2 && bytes.len() % 2 == 0 {
                let code_units: Vec<u16> = bytes
                    .chunks(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                let decoded = String::from_utf16_lossy(&code_units);
                if !decoded.is_empty() && !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                    return decoded;
                }
            }
        }

        decode_text_simple(bytes)
    }
}

/// Page height from the MediaBox, walking up the page tree when the entry
/// is inherited. Shared with the annotator, which needs the same value to
/// flip row coordinates back into device space.
pub fn page_height_of(doc: &lopdf::Document, page: PageId) -> Result<f64, AttestError> {
    let page_obj = doc
        .get_object(page)
        .map_err(|e| AttestError::Parse(format!("cannot get page object: {}", e)))?;

    let page_dict = page_obj
        .as_dict()
        .map_err(|e| AttestError::Parse(format!("page object is not a dictionary: {}", e)))?;

    let media_box = find_media_box(doc, page_dict)
        .ok_or_else(|| AttestError::Parse("MediaBox not found for page".into()))?;

    let nums = array_to_f64s(doc, &media_box)?;
    if nums.len() < 4 {
        return Err(AttestError::Parse(format!(
            "MediaBox has {} elements, expected 4",
            nums.len()
        )));
    }

    Ok(nums[3] - nums[1])
}

/// Walk up the page tree to find the MediaBox array.
fn find_media_box(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> Option<Vec<lopdf::Object>> {
    if let Ok(obj) = dict.get(b"MediaBox") {
        if let Some(arr) = resolve_array(doc, obj) {
            return Some(arr);
        }
    }

    // Recurse into Parent.
    if let Ok(parent_ref) = dict.get(b"Parent") {
        if let Ok(parent_id) = parent_ref.as_reference() {
            if let Ok(parent_obj) = doc.get_object(parent_id) {
                if let Ok(parent_dict) = parent_obj.as_dict() {
                    return find_media_box(doc, parent_dict);
                }
            }
        }
    }

    None
}

/// Resolve an object to an array, following a single level of indirection.
fn resolve_array(doc: &lopdf::Document, obj: &lopdf::Object) -> Option<Vec<lopdf::Object>> {
    match obj {
        lopdf::Object::Array(arr) => Some(arr.clone()),
        lopdf::Object::Reference(id) => {
            if let Ok(resolved) = doc.get_object(*id) {
                if let Ok(arr) = resolved.as_array() {
                    return Some(arr.clone());
                }
            }
            None
        }
        _ => None,
    }
}

fn array_to_f64s(doc: &lopdf::Document, objects: &[lopdf::Object]) -> Result<Vec<f64>, AttestError> {
    objects
        .iter()
        .map(|obj| {
            let resolved = match obj {
                lopdf::Object::Reference(id) => doc
                    .get_object(*id)
                    .map_err(|e| AttestError::Parse(e.to_string()))?,
                other => other,
            };
            match resolved {
                lopdf::Object::Integer(i) => Ok(*i as f64),
                lopdf::Object::Real(f) => Ok(*f as f64),
                _ => Err(AttestError::Parse(format!(
                    "expected number in array, got {:?}",
                    resolved
                ))),
            }
        })
        .collect()
}

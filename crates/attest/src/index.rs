//! Corpus indexing and the filesystem-facing operations.
//!
//! All data roots come in through [`Config`]; nothing in here consults the
//! process working directory. Index files are single-writer atomic-replace
//! artifacts: serialized to a temp file in the destination directory, then
//! renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::annotate::annotate_document;
use crate::parser::backend::LopdfBackend;
use crate::parser::layout::extract_document;
use crate::types::{Attestation, PageText};
use crate::{collect, detect, AttestError};

/// Data roots for the filesystem-facing operations, injected by the caller.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the source PDF tree, organized as `<root>/<group>/.../<file>.pdf`.
    pub source_root: PathBuf,
    /// Root of the index artifacts, mirroring the source tree with `.json`
    /// extensions.
    pub index_root: PathBuf,
    /// Root for per-request annotated output.
    pub request_root: PathBuf,
}

/// Per-document result of an indexing pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Indexed { attestations: usize },
    Failed { reason: String },
}

/// One entry per source PDF visited by [`index_corpus`].
#[derive(Debug, Clone)]
pub struct DocumentReport {
    /// Path relative to the source root.
    pub path: PathBuf,
    pub outcome: DocumentOutcome,
}

/// Batch report for a full indexing pass. A failed document never aborts
/// the batch; it is recorded here instead.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub documents: Vec<DocumentReport>,
}

impl IndexReport {
    pub fn indexed(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, DocumentOutcome::Indexed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.indexed()
    }
}

/// Run the full pipeline on already-extracted pages: detect markers, bound
/// the spans, collect each span's content.
pub fn index_pages(pages: &[PageText]) -> Vec<Attestation> {
    let markers = detect::detect_markers(pages);
    let mut attestations = detect::build_spans(&markers);
    for attestation in &mut attestations {
        collect::collect_content(attestation, pages);
    }
    attestations
}

/// Index a single PDF from its raw bytes.
pub fn index_document(pdf: &[u8]) -> Result<Vec<Attestation>, AttestError> {
    let backend = LopdfBackend::load_bytes(pdf)?;
    let pages = extract_document(&backend)?;
    Ok(index_pages(&pages))
}

/// Walk the whole source tree and (re)write every index artifact.
///
/// Strictly sequential per document. Extraction and write failures are
/// logged, recorded in the report, and never abort the remaining files.
pub fn index_corpus(config: &Config) -> IndexReport {
    let mut report = IndexReport::default();

    for entry in WalkBuilder::new(&config.source_root).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("walk error under {}: {}", config.source_root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            continue;
        }

        let Ok(rel) = path.strip_prefix(&config.source_root) else {
            continue;
        };
        let rel = rel.to_path_buf();

        let outcome = match index_one(config, path, &rel) {
            Ok(count) => {
                log::info!("indexed {} ({} attestations)", rel.display(), count);
                DocumentOutcome::Indexed {
                    attestations: count,
                }
            }
            Err(err) => {
                log::warn!("indexing {} failed: {}", rel.display(), err);
                DocumentOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };
        report.documents.push(DocumentReport { path: rel, outcome });
    }

    report
}

fn index_one(config: &Config, path: &Path, rel: &Path) -> Result<usize, AttestError> {
    let bytes = fs::read(path)?;
    let attestations = index_document(&bytes)?;
    let index_path = config.index_root.join(rel).with_extension("json");
    write_index(&index_path, &attestations)?;
    Ok(attestations.len())
}

/// Serialize an attestation list to `path` atomically.
fn write_index(path: &Path, attestations: &[Attestation]) -> Result<(), AttestError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let json = serde_json::to_vec_pretty(attestations)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(&json)?;
    tmp.persist(path).map_err(|e| AttestError::Io(e.error))?;

    Ok(())
}

/// Load the index artifact mirroring a source-relative PDF path.
fn read_index(config: &Config, rel: &Path) -> Result<Vec<Attestation>, AttestError> {
    let index_path = config.index_root.join(rel).with_extension("json");
    let json = fs::read(&index_path)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Draw the requested attestations onto copies of one group's PDFs.
///
/// Output lands under `request_root/<request_id>/` mirroring the source
/// layout; the returned paths are relative to `request_root`. Best effort:
/// documents without a readable index are skipped with a warning, and the
/// drawn set is the requested ids intersected with what indexing found.
pub fn annotate_request(
    config: &Config,
    request_id: &str,
    group_id: &str,
    attestation_ids: &[String],
) -> Result<Vec<PathBuf>, AttestError> {
    if !is_numeric(group_id) {
        return Err(AttestError::InvalidGroupId(group_id.to_string()));
    }
    if request_id.is_empty()
        || request_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '.')
    {
        return Err(AttestError::InvalidRequestId(request_id.to_string()));
    }

    let group_root = config.source_root.join(group_id);
    let mut outputs: Vec<PathBuf> = Vec::new();

    for entry in WalkBuilder::new(&group_root).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("walk error under {}: {}", group_root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            continue;
        }
        let Ok(rel) = path.strip_prefix(&config.source_root) else {
            continue;
        };

        let index = match read_index(config, rel) {
            Ok(index) => index,
            Err(err) => {
                log::warn!("no usable index for {}: {}", rel.display(), err);
                continue;
            }
        };

        let result = fs::read(path)
            .map_err(AttestError::from)
            .and_then(|bytes| annotate_document(&bytes, &index, attestation_ids));
        let annotated = match result {
            Ok(annotated) => annotated,
            Err(err) => {
                log::warn!("annotating {} failed: {}", rel.display(), err);
                continue;
            }
        };

        let out_rel = Path::new(request_id).join(rel);
        let out_path = config.request_root.join(&out_rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, &annotated)?;
        outputs.push(out_rel);
    }

    Ok(outputs)
}

/// Fetch a group's index for the document named after the group.
///
/// The group id is validated before any file access; `Ok(None)` means the
/// group has no index artifact, which is not an error.
pub fn lookup_group(config: &Config, group_id: &str) -> Result<Option<Vec<Attestation>>, AttestError> {
    if !is_numeric(group_id) {
        return Err(AttestError::InvalidGroupId(group_id.to_string()));
    }

    let group_root = config.index_root.join(group_id);
    if !group_root.is_dir() {
        return Ok(None);
    }

    let wanted = format!("{}.json", group_id);
    for entry in WalkBuilder::new(&group_root).build().flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if entry.file_name().to_string_lossy() == wanted {
            let json = fs::read(entry.path())?;
            return Ok(Some(serde_json::from_slice(&json)?));
        }
    }

    Ok(None)
}

/// Path-sensitive identifiers must be plain decimal strings.
fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextRun;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    fn run(text: &str, x: f64, y: f64, height: f64) -> TextRun {
        TextRun {
            text: text.to_string(),
            x,
            y,
            height,
            font: "Helvetica".to_string(),
        }
    }

    fn config(root: &Path) -> Config {
        Config {
            source_root: root.join("requests"),
            index_root: root.join("data"),
            request_root: root.join("out"),
        }
    }

    /// One-page certificate-shaped PDF: a header token, a body line, and
    /// the terminating notes heading.
    fn certificate_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");

        let text_op = |y: f32, s: &str| {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Real(9.0)]),
                Operation::new(
                    "Tm",
                    vec![
                        Object::Real(1.0),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(1.0),
                        Object::Real(68.0),
                        Object::Real(y),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(s)]),
                Operation::new("ET", vec![]),
            ]
        };

        let mut operations = Vec::new();
        // Device y 700 is 142 from the top of an 842pt page.
        operations.extend(text_op(700.0, "II.1.Health-attestation"));
        operations.extend(text_op(650.0, "the animals described above"));
        operations.extend(text_op(600.0, "Notes"));

        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            Content { operations }.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn index_pages_runs_full_pipeline() {
        let pages = vec![PageText {
            number: 1,
            height: 842.0,
            runs: vec![
                run("II.1.Health-attestation", 68.0, 142.0, 9.0),
                run("the animals described above", 68.0, 192.0, 9.0),
                run("Notes", 68.0, 242.0, 9.0),
            ],
        }];

        let attestations = index_pages(&pages);
        assert_eq!(attestations.len(), 1);
        assert_eq!(attestations[0].id, "II.1.Health-attestation-0");
        assert_eq!(attestations[0].start_y, 142);
        assert_eq!(attestations[0].end_y, 242);
        let texts: Vec<&str> = attestations[0].lines.iter().map(|l| l.str.as_str()).collect();
        assert_eq!(
            texts,
            vec!["II.1.Health-attestation", "the animals described above"]
        );
    }

    #[test]
    fn index_document_from_pdf_bytes() {
        let attestations = index_document(&certificate_pdf()).unwrap();
        assert_eq!(attestations.len(), 1);
        assert_eq!(attestations[0].name, "II.1.Health-attestation");
        assert!(attestations[0]
            .lines
            .iter()
            .any(|l| l.str == "the animals described above"));
    }

    #[test]
    fn index_corpus_writes_mirrored_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pdf_path = cfg.source_root.join("12/en/12.pdf");
        fs::create_dir_all(pdf_path.parent().unwrap()).unwrap();
        fs::write(&pdf_path, certificate_pdf()).unwrap();

        let report = index_corpus(&cfg);
        assert_eq!(report.indexed(), 1);
        assert_eq!(report.failed(), 0);

        let index_path = cfg.index_root.join("12/en/12.json");
        let json = fs::read(&index_path).unwrap();
        let parsed: Vec<Attestation> = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed.len(), 1);

        // Atomic write leaves no temp files behind.
        let leftovers: Vec<_> = fs::read_dir(index_path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != index_path)
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn bad_document_recorded_without_aborting_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        fs::create_dir_all(cfg.source_root.join("1")).unwrap();
        fs::create_dir_all(cfg.source_root.join("2")).unwrap();
        fs::write(cfg.source_root.join("1/1.pdf"), b"not a pdf").unwrap();
        fs::write(cfg.source_root.join("2/2.pdf"), certificate_pdf()).unwrap();

        let report = index_corpus(&cfg);
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.indexed(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn annotate_request_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pdf_path = cfg.source_root.join("7/7.pdf");
        fs::create_dir_all(pdf_path.parent().unwrap()).unwrap();
        fs::write(&pdf_path, certificate_pdf()).unwrap();
        index_corpus(&cfg);

        let outputs = annotate_request(
            &cfg,
            "42",
            "7",
            &["II.1.Health-attestation-0".to_string()],
        )
        .unwrap();

        assert_eq!(outputs, vec![PathBuf::from("42/7/7.pdf")]);
        let written = fs::read(cfg.request_root.join("42/7/7.pdf")).unwrap();
        assert!(written.starts_with(b"%PDF-"));
    }

    #[test]
    fn annotate_request_skips_unindexed_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pdf_path = cfg.source_root.join("7/7.pdf");
        fs::create_dir_all(pdf_path.parent().unwrap()).unwrap();
        fs::write(&pdf_path, certificate_pdf()).unwrap();

        let outputs = annotate_request(&cfg, "42", "7", &[]).unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn annotate_request_validates_identifiers() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());

        assert!(matches!(
            annotate_request(&cfg, "42", "../7", &[]),
            Err(AttestError::InvalidGroupId(_))
        ));
        assert!(matches!(
            annotate_request(&cfg, "../42", "7", &[]),
            Err(AttestError::InvalidRequestId(_))
        ));
    }

    #[test]
    fn lookup_rejects_non_numeric_group() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());

        assert!(matches!(
            lookup_group(&cfg, "7a"),
            Err(AttestError::InvalidGroupId(_))
        ));
        assert!(matches!(
            lookup_group(&cfg, ""),
            Err(AttestError::InvalidGroupId(_))
        ));
    }

    #[test]
    fn lookup_missing_group_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        assert!(lookup_group(&cfg, "99").unwrap().is_none());
    }

    #[test]
    fn lookup_finds_group_index_in_nested_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pdf_path = cfg.source_root.join("5/en/5.pdf");
        fs::create_dir_all(pdf_path.parent().unwrap()).unwrap();
        fs::write(&pdf_path, certificate_pdf()).unwrap();
        index_corpus(&cfg);

        let found = lookup_group(&cfg, "5").unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "II.1.Health-attestation");
    }
}

//! Attestation indexing and underline annotation for certificate PDFs.
//!
//! Two-phase pipeline:
//!
//! 1. **Indexing** -- extract positioned text runs per page, detect
//!    attestation boundary headers, bound each attestation's span by the next
//!    header's position, collect the runs inside the span, and persist the
//!    result as a per-document JSON index.
//! 2. **Annotation** -- given a persisted index and a selection of
//!    attestation ids, re-open the source PDF and stroke an underline
//!    beneath each of the attestation's body-text lines.
//!
//! [`index::Config`] carries the data roots; the filesystem-facing entry
//! points are [`index::index_corpus`], [`index::annotate_request`], and
//! [`index::lookup_group`].

use thiserror::Error;

pub mod annotate;
pub mod collect;
pub mod detect;
pub mod index;
pub mod parser;
pub mod select;
pub mod types;

pub use index::{Config, DocumentOutcome, DocumentReport, IndexReport};
pub use types::{Attestation, Line, PageText, TextRun};

#[derive(Error, Debug)]
pub enum AttestError {
    /// The PDF could not be parsed or a page was structurally malformed.
    #[error("pdf parse error: {0}")]
    Parse(String),

    #[error("document is encrypted")]
    Encrypted,

    /// A path-sensitive group identifier was not a plain decimal string.
    #[error("invalid group id: {0:?}")]
    InvalidGroupId(String),

    /// A request identifier contained path-unsafe characters.
    #[error("invalid request id: {0:?}")]
    InvalidRequestId(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

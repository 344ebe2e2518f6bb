//! Positioned-text extraction from PDF documents.
//!
//! [`backend`] owns the lopdf seam; [`layout`] walks content streams and
//! emits [`crate::TextRun`]s in stream order. Everything downstream of this
//! module works on pure data.

pub mod backend;
pub mod layout;

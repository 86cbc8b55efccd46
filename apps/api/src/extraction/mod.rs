//! Document extraction — turns an uploaded PDF or DOCX buffer into plain text.
//!
//! Extraction is CPU-bound and the parsers are not panic-free on hostile input,
//! so the pipeline always goes through `extract_blocking`, which runs the work
//! inside `tokio::task::spawn_blocking` and folds a panic into `ExtractError::Aborted`.
//! Nothing here touches the filesystem: parsers only ever see the in-memory buffer.

mod docx;
mod pdf;

#[cfg(test)]
pub(crate) use docx::tests::docx_fixture;
#[cfg(test)]
pub(crate) use pdf::tests::pdf_fixture;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::evaluation::models::ErrorKind;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// Which side of the comparison a document plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRole {
    Curriculum,
    Report,
}

impl DocumentRole {
    /// Multipart field name the upload form uses for this role.
    pub fn field_name(self) -> &'static str {
        match self {
            DocumentRole::Curriculum => "curriculum",
            DocumentRole::Report => "report",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        match name {
            "curriculum" => Some(DocumentRole::Curriculum),
            "report" => Some(DocumentRole::Report),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Declared format of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Docx,
    /// Anything else, carrying what the client declared (MIME type or file name).
    Unsupported(String),
}

impl MediaType {
    /// Resolves the declared format from a part's `Content-Type`, falling back to the
    /// file extension when the client sent no type or the generic octet-stream.
    pub fn from_declared(content_type: Option<&str>, file_name: Option<&str>) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty());

        match mime.as_deref() {
            Some(PDF_MIME) => return MediaType::Pdf,
            Some(DOCX_MIME) => return MediaType::Docx,
            Some(other) if other != OCTET_STREAM_MIME => {
                return MediaType::Unsupported(other.to_string())
            }
            _ => {}
        }

        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => MediaType::Pdf,
            Some("docx") => MediaType::Docx,
            _ => MediaType::Unsupported(
                file_name
                    .map(str::to_string)
                    .or(mime)
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
        }
    }
}

/// One uploaded file. Lives for a single request and is consumed by extraction.
#[derive(Debug, Clone)]
pub struct Document {
    pub role: DocumentRole,
    pub media_type: MediaType,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(role: DocumentRole, media_type: MediaType, bytes: impl Into<Bytes>) -> Self {
        Self {
            role,
            media_type,
            bytes: bytes.into(),
        }
    }
}

/// Plain text pulled out of a `Document`, one line per page or paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub role: DocumentRole,
    pub content: String,
    /// Length in Unicode scalar values, not bytes.
    pub char_count: usize,
}

impl ExtractedText {
    pub fn new(role: DocumentRole, content: String) -> Self {
        let char_count = content.chars().count();
        Self {
            role,
            content,
            char_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{role} document has unsupported format '{declared}' (expected PDF or DOCX)")]
    UnsupportedFormat {
        role: DocumentRole,
        declared: String,
    },

    #[error("could not read {role} PDF: {message}")]
    Pdf { role: DocumentRole, message: String },

    #[error("could not read {role} DOCX: {message}")]
    Docx { role: DocumentRole, message: String },

    #[error("extraction of {role} document aborted: {message}")]
    Aborted { role: DocumentRole, message: String },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ExtractError::Pdf { .. } | ExtractError::Docx { .. } | ExtractError::Aborted { .. } => {
                ErrorKind::ExtractionFailed
            }
        }
    }
}

/// Extracts plain text from a document, dispatching on its declared format.
///
/// A zero-byte buffer yields empty text without invoking a parser.
pub fn extract(document: &Document) -> Result<ExtractedText, ExtractError> {
    let role = document.role;
    let content = match &document.media_type {
        MediaType::Unsupported(declared) => {
            return Err(ExtractError::UnsupportedFormat {
                role,
                declared: declared.clone(),
            })
        }
        _ if document.bytes.is_empty() => String::new(),
        MediaType::Pdf => pdf::extract_text(role, &document.bytes)?,
        MediaType::Docx => docx::extract_text(role, &document.bytes)?,
    };

    let extracted = ExtractedText::new(role, content);
    debug!(
        "Extracted {} chars from {} ({:?}, {} bytes)",
        extracted.char_count,
        role,
        document.media_type,
        document.bytes.len()
    );
    Ok(extracted)
}

/// Runs `extract` on the blocking pool. A panic inside a parser surfaces as
/// `ExtractError::Aborted` instead of tearing down the request task.
pub async fn extract_blocking(document: Document) -> Result<ExtractedText, ExtractError> {
    let role = document.role;
    tokio::task::spawn_blocking(move || extract(&document))
        .await
        .map_err(|e| ExtractError::Aborted {
            role,
            message: e.to_string(),
        })?
}

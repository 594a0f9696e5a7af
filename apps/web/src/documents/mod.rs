//! Document text extraction and normalization.
//!
//! Uploads are read by extension: `.pdf`, `.docx`, anything else as text
//! (UTF-8, Latin-1 fallback). Extracted text goes through `normalize_display`
//! for the UI; `clean_for_model` produces the low-noise copy used for embeddings.

use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, warn};

const DOCX_BODY: &str = "word/document.xml";

static SPACES_TABS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static URLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\S+|https\S+").expect("valid regex"));
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Text runs, tabs, breaks and paragraph ends in WordprocessingML.
static DOCX_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>").expect("valid regex")
});
static XML_ENTITIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9a-fA-F]+);").expect("valid regex"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX archive error: {0}")]
    Docx(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => DocumentKind::Pdf,
            "docx" => DocumentKind::Docx,
            _ => DocumentKind::Text,
        }
    }
}

/// Extracts display-ready text from an uploaded file.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_filename(filename);
    let raw = match kind {
        DocumentKind::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?
        }
        DocumentKind::Docx => extract_docx(bytes)?,
        DocumentKind::Text => decode_text(bytes),
    };
    debug!("Extracted {} chars from {filename} ({kind:?})", raw.len());
    Ok(normalize_display(&raw))
}

/// Runs `extract_text` on the blocking pool. Failures (including panics inside
/// the PDF parser) are logged and yield an empty string.
pub async fn extract_upload(filename: String, bytes: Vec<u8>) -> String {
    let name = filename.clone();
    let result = tokio::task::spawn_blocking(move || extract_text(&filename, &bytes))
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))
        .and_then(|r| r);

    match result {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not extract text from {name}: {e}");
            String::new()
        }
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name(DOCX_BODY)?.read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

/// One line per paragraph.
fn docx_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    for caps in DOCX_TOKENS.captures_iter(xml) {
        match caps.get(1) {
            Some(run) => out.push_str(&unescape_xml(run.as_str())),
            None => match &caps[0] {
                "</w:p>" => out.push('\n'),
                token if token.starts_with("<w:tab") => out.push('\t'),
                _ => out.push('\n'),
            },
        }
    }
    out
}

fn unescape_xml(text: &str) -> String {
    XML_ENTITIES
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_else(|| caps[0].to_string())
                }
            }
        })
        .into_owned()
}

/// UTF-8, falling back to Latin-1 (every byte maps to one char).
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Display normalization: keeps punctuation and line structure.
///
/// CRLF/CR become LF, NBSP becomes a space, runs of spaces/tabs collapse to
/// one space, three or more newlines collapse to two, and the result is trimmed.
pub fn normalize_display(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n").replace('\u{a0}', " ");
    let text = SPACES_TABS.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Low-noise copy for embeddings: URLs, punctuation and digits removed,
/// lower-cased, whitespace collapsed.
pub fn clean_for_model(text: &str) -> String {
    let text = URLS.replace_all(text, " ");
    let text = PUNCTUATION.replace_all(&text, " ");
    let text = text.to_lowercase();
    let text = DIGITS.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

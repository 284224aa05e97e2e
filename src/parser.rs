use crate::dialect::Dialect;
use crate::extract::extract;
use crate::record::Record;
use crate::ris::parse_ris;
use crate::segment::segment;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unsupported file type: {0} (expected .ris or .txt)")]
    UnsupportedFormat(String),
}

/// File container, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// RIS tagged export
    Ris,
    /// Plain-text export in one of the text dialects
    Text,
}

impl ContainerKind {
    pub fn from_filename(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".ris") {
            Some(ContainerKind::Ris)
        } else if lower.ends_with(".txt") {
            Some(ContainerKind::Text)
        } else {
            None
        }
    }
}

/// Parse a file from disk. Only I/O and unknown extensions are errors;
/// malformed content gives fewer records.
pub fn parse_file(path: &Path) -> Result<Vec<Record>, ParseError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = ContainerKind::from_filename(&name)
        .ok_or_else(|| ParseError::UnsupportedFormat(path.display().to_string()))?;

    let content = fs::read(path)?;
    Ok(parse_bytes(&content, kind))
}

/// Parse raw bytes, choosing the container from `filename`.
///
/// Files that are neither `.ris` nor `.txt` are read as plain text.
pub fn parse(content: &[u8], filename: &str) -> Vec<Record> {
    let kind = ContainerKind::from_filename(filename).unwrap_or(ContainerKind::Text);
    parse_bytes(content, kind)
}

pub fn parse_bytes(content: &[u8], kind: ContainerKind) -> Vec<Record> {
    let text = decode(content);
    match kind {
        ContainerKind::Ris => parse_ris(&text),
        ContainerKind::Text => parse_text(&text),
    }
}

/// Parse a plain-text export: detect the dialect, split records, extract fields
pub fn parse_text(text: &str) -> Vec<Record> {
    let dialect = Dialect::detect(text);
    let spans = segment(text, dialect);
    debug!("Detected {} layout with {} record spans", dialect, spans.len());

    spans
        .into_iter()
        .map(|span| extract(span, dialect))
        .filter(Record::has_content)
        .collect()
}

/// Decode as UTF-8, replacing invalid sequences and dropping a leading BOM
pub fn decode(content: &[u8]) -> String {
    let text = String::from_utf8_lossy(content);
    text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string()
}

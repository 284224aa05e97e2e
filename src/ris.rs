//! RIS container support.
//!
//! RIS files are first read by a strict, structure-checking parser into
//! tagged entries. If the file breaks RIS structure anywhere, the whole file
//! is re-read with the lenient `ER`-terminated tag extractor instead.

use crate::dialect::Dialect;
use crate::extract::extract;
use crate::normalize::{clean_abstract, clean_text, extract_year, normalize_doi};
use crate::record::Record;
use crate::segment::split_ris_terminated;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

static RIS_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][A-Z0-9])\s+-\s?(.*)$").unwrap());

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RisError {
    #[error("{tag} outside of RIS entry at line {line}")]
    OutsideEntry { tag: String, line: usize },
    #[error("nested TY without ER at line {0}")]
    NestedEntry(usize),
    #[error("ER without TY at line {0}")]
    UnmatchedEnd(usize),
    #[error("no RIS entries found")]
    Empty,
}

/// One `TY` .. `ER` block with its tag values in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RisEntry {
    pub entry_type: String,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl RisEntry {
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.fields
            .get(tag)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn all(&self, tag: &str) -> &[String] {
        self.fields.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Map the structured fields onto a canonical record.
    ///
    /// Title falls back from `TI` to `T1`, authors from `AU` to `A1`, year
    /// from `PY` to `Y1`, abstract from `AB` to `N2`. A DOI missing from `DO`
    /// is taken from a `doi.org` link if one is present.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();

        record.title = self
            .first("TI")
            .or_else(|| self.first("T1"))
            .and_then(clean_text);

        let authors = if self.all("AU").is_empty() {
            self.all("A1")
        } else {
            self.all("AU")
        };
        for author in authors.iter().filter_map(|a| clean_text(a)) {
            record.push_author(&author);
        }

        record.year = self
            .first("PY")
            .or_else(|| self.first("Y1"))
            .and_then(extract_year);

        record.doi = self.first("DO").and_then(normalize_doi).or_else(|| {
            ["UR", "L2", "LK"]
                .iter()
                .flat_map(|tag| self.all(tag))
                .filter(|url| url.contains("doi.org/"))
                .find_map(|url| url.find("doi.org/").and_then(|i| normalize_doi(&url[i + 8..])))
        });

        record.abstract_text = self
            .first("AB")
            .and_then(clean_abstract)
            .or_else(|| self.first("N2").and_then(clean_abstract));

        record
    }
}

/// Strictly parse RIS text into entries.
///
/// Untagged lines inside an entry continue the previous tag's value; untagged
/// lines outside any entry (export headers) are skipped.
pub fn parse_entries(content: &str) -> Result<Vec<RisEntry>, RisError> {
    let mut entries = Vec::new();
    let mut current: Option<RisEntry> = None;
    let mut last_tag: Option<String> = None;

    for (line_no, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let Some(caps) = RIS_LINE_RE.captures(line) else {
            if let (Some(entry), Some(tag)) = (current.as_mut(), last_tag.as_ref()) {
                if let Some(value) = entry.fields.get_mut(tag).and_then(|v| v.last_mut()) {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
            }
            continue;
        };

        let tag = &caps[1];
        let value = caps[2].trim();

        match tag {
            "TY" => {
                if current.is_some() {
                    return Err(RisError::NestedEntry(line_no + 1));
                }
                current = Some(RisEntry {
                    entry_type: value.to_string(),
                    fields: BTreeMap::new(),
                });
                last_tag = None;
            }
            "ER" => {
                let Some(entry) = current.take() else {
                    return Err(RisError::UnmatchedEnd(line_no + 1));
                };
                entries.push(entry);
                last_tag = None;
            }
            _ => {
                let Some(entry) = current.as_mut() else {
                    return Err(RisError::OutsideEntry {
                        tag: tag.to_string(),
                        line: line_no + 1,
                    });
                };
                entry
                    .fields
                    .entry(tag.to_string())
                    .or_default()
                    .push(value.to_string());
                last_tag = Some(tag.to_string());
            }
        }
    }

    if let Some(entry) = current.take() {
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(RisError::Empty);
    }

    Ok(entries)
}

/// Parse RIS text, falling back to the tag extractor when the structure is broken
pub fn parse_ris(content: &str) -> Vec<Record> {
    let records: Vec<Record> = match parse_entries(content) {
        Ok(entries) => entries.iter().map(RisEntry::to_record).collect(),
        Err(e) => {
            debug!("Strict RIS parse failed ({}), using tag fallback", e);
            parse_ris_fallback(content)
        }
    };

    records.into_iter().filter(Record::has_content).collect()
}

/// Lenient reading: split on `ER  -` terminators and extract each block as tag lines
pub fn parse_ris_fallback(content: &str) -> Vec<Record> {
    split_ris_terminated(content)
        .into_iter()
        .map(|span| extract(span, Dialect::TagErTerminated))
        .collect()
}

//! Field extraction for raw record spans.
//!
//! Every dialect shares one accumulation loop. A [`LineClassifier`] decides
//! whether a line opens a new field, continues the open one or carries
//! nothing; a static tag table maps field tags onto canonical fields.

use crate::dialect::Dialect;
use crate::normalize::{clean_abstract, clean_text, extract_year, normalize_doi};
use crate::record::{Field, Record};
use once_cell::sync::Lazy;
use regex::Regex;

static PUBMED_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]+)\s*-\s*(.*)$").unwrap());
static ER_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][A-Z0-9])(?:[ \t]*-[ \t]*|[ \t]+|$)(.*)$").unwrap());
static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(Authors?|Title|Year|DOI|Abstract)\s*:\s*(.*)$").unwrap()
});
static OTHER_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z ]*?)\s*:\s*(.*)$").unwrap());
static CITATION_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(ID|AU|TI|SO|YR|XR|PT|KY|AB|DOI|US):\s*(.*)$").unwrap()
});
static DOI_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.+?)\s*\[doi\]").unwrap());

/// What a single line of a record span contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Opens a new field; `value` may be empty when content follows on later lines
    FieldStart { tag: &'a str, value: &'a str },
    /// Extra text for the field currently open
    Continuation(&'a str),
    /// Blank lines, record markers, unrecognized lines
    Ignore,
}

/// How the content of a tag is stored once the field is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// Replace the field with the normalized value
    Set(Field),
    /// Append to the author list
    AppendAuthor,
    /// DOI carried as `<doi> [doi]`; other identifiers on the tag are skipped
    MarkedDoi,
}

/// Per-dialect line recognition plus its tag table
pub trait LineClassifier {
    fn classify<'a>(&self, line: &'a str) -> LineKind<'a>;

    fn tags(&self) -> &'static [(&'static str, TagAction)];

    fn action(&self, tag: &str) -> Option<TagAction> {
        self.tags()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag))
            .map(|(_, action)| *action)
    }
}

const PUBMED_TAGS: &[(&str, TagAction)] = &[
    ("TI", TagAction::Set(Field::Title)),
    ("AU", TagAction::AppendAuthor),
    ("FAU", TagAction::AppendAuthor),
    ("DP", TagAction::Set(Field::Year)),
    ("AID", TagAction::MarkedDoi),
    ("LID", TagAction::MarkedDoi),
    ("AB", TagAction::Set(Field::Abstract)),
];

const ER_TAGS: &[(&str, TagAction)] = &[
    ("TI", TagAction::Set(Field::Title)),
    ("AU", TagAction::AppendAuthor),
    ("A1", TagAction::AppendAuthor),
    ("A2", TagAction::AppendAuthor),
    ("PY", TagAction::Set(Field::Year)),
    ("Y1", TagAction::Set(Field::Year)),
    ("DI", TagAction::Set(Field::Doi)),
    ("DO", TagAction::Set(Field::Doi)),
    ("AB", TagAction::Set(Field::Abstract)),
];

const LABELED_TAGS: &[(&str, TagAction)] = &[
    ("Title", TagAction::Set(Field::Title)),
    ("Authors", TagAction::Set(Field::Authors)),
    ("Author", TagAction::Set(Field::Authors)),
    ("Year", TagAction::Set(Field::Year)),
    ("DOI", TagAction::Set(Field::Doi)),
    ("Abstract", TagAction::Set(Field::Abstract)),
];

const NUMBERED_TAGS: &[(&str, TagAction)] = &[
    ("TITLE", TagAction::Set(Field::Title)),
    ("AUTHOR NAMES", TagAction::Set(Field::Authors)),
    ("PUBLICATION YEAR", TagAction::Set(Field::Year)),
    ("DOI", TagAction::Set(Field::Doi)),
    ("ABSTRACT", TagAction::Set(Field::Abstract)),
];

const CITATION_TAGS: &[(&str, TagAction)] = &[
    ("TI", TagAction::Set(Field::Title)),
    ("AU", TagAction::AppendAuthor),
    ("YR", TagAction::Set(Field::Year)),
    ("DOI", TagAction::Set(Field::Doi)),
    ("AB", TagAction::Set(Field::Abstract)),
];

/// MEDLINE tag lines; indented lines wrap the previous tag
pub struct PubmedLines;

impl LineClassifier for PubmedLines {
    fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineKind::Ignore;
        }
        if is_indented(line) {
            return LineKind::Continuation(trimmed);
        }
        match PUBMED_TAG_RE.captures(trimmed) {
            Some(caps) => field_start(&caps),
            None => LineKind::Continuation(trimmed),
        }
    }

    fn tags(&self) -> &'static [(&'static str, TagAction)] {
        PUBMED_TAGS
    }
}

/// Two-character tags, records closed by `ER`.
///
/// The dash after the tag is optional, so both `TI  - x` and the dashless
/// `TI x` of Web of Science exports open a field.
pub struct ErTerminatedLines;

impl LineClassifier for ErTerminatedLines {
    fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "ER" {
            return LineKind::Ignore;
        }
        if is_indented(line) {
            return LineKind::Continuation(trimmed);
        }
        match ER_TAG_RE.captures(trimmed) {
            Some(caps) => field_start(&caps),
            None => LineKind::Continuation(trimmed),
        }
    }

    fn tags(&self) -> &'static [(&'static str, TagAction)] {
        ER_TAGS
    }
}

/// `Label: value` lines, values wrapped onto indented lines.
///
/// Labels outside the table still close the open field so their wrapped
/// lines are not appended to it.
pub struct LabeledLines;

impl LineClassifier for LabeledLines {
    fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let line = line.trim_end();
        if let Some(caps) = LABEL_RE.captures(line) {
            return field_start(&caps);
        }
        if line.trim().is_empty() {
            return LineKind::Ignore;
        }
        if is_indented(line) {
            return LineKind::Continuation(line.trim());
        }
        match OTHER_LABEL_RE.captures(line) {
            Some(caps) => field_start(&caps),
            None => LineKind::Ignore,
        }
    }

    fn tags(&self) -> &'static [(&'static str, TagAction)] {
        LABELED_TAGS
    }
}

/// Standalone upper-case labels with the value indented underneath.
///
/// Every unindented line is a label; the ones missing from the table open a
/// field that is discarded.
pub struct NumberedLines;

impl LineClassifier for NumberedLines {
    fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("RECORD ") {
            return LineKind::Ignore;
        }
        if is_indented(line) {
            LineKind::Continuation(trimmed)
        } else {
            LineKind::FieldStart {
                tag: trimmed,
                value: "",
            }
        }
    }

    fn tags(&self) -> &'static [(&'static str, TagAction)] {
        NUMBERED_TAGS
    }
}

/// `TI:`-style codes inside `Record #n of m` blocks
pub struct CitationExportLines;

impl LineClassifier for CitationExportLines {
    fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("Record #") {
            return LineKind::Ignore;
        }
        match CITATION_CODE_RE.captures(trimmed) {
            Some(caps) => field_start(&caps),
            None => LineKind::Continuation(trimmed),
        }
    }

    fn tags(&self) -> &'static [(&'static str, TagAction)] {
        CITATION_TAGS
    }
}

/// Line classifier for a dialect
pub fn classifier_for(dialect: Dialect) -> &'static dyn LineClassifier {
    match dialect {
        Dialect::TagPubmed => &PubmedLines,
        Dialect::TagErTerminated => &ErTerminatedLines,
        Dialect::LabeledFullFields => &LabeledLines,
        Dialect::NumberedRecordBlock => &NumberedLines,
        Dialect::CitationExportBlock => &CitationExportLines,
    }
}

/// Extract one record from a raw span of the given dialect
pub fn extract(span: &str, dialect: Dialect) -> Record {
    extract_with(span, classifier_for(dialect))
}

/// Shared accumulation loop: a field stays open until the next field start,
/// collecting continuation lines joined by spaces.
pub fn extract_with(span: &str, classifier: &dyn LineClassifier) -> Record {
    let mut record = Record::new();
    let mut open: Option<&str> = None;
    let mut content: Vec<&str> = Vec::new();

    for line in span.lines() {
        match classifier.classify(line) {
            LineKind::FieldStart { tag, value } => {
                if let Some(previous) = open.take() {
                    flush(&mut record, classifier, previous, &content);
                }
                open = Some(tag);
                content.clear();
                let value = value.trim();
                if !value.is_empty() {
                    content.push(value);
                }
            }
            LineKind::Continuation(text) => {
                if open.is_some() {
                    content.push(text);
                }
            }
            LineKind::Ignore => {}
        }
    }

    if let Some(tag) = open {
        flush(&mut record, classifier, tag, &content);
    }

    record
}

fn flush(record: &mut Record, classifier: &dyn LineClassifier, tag: &str, content: &[&str]) {
    if content.is_empty() {
        return;
    }
    let Some(action) = classifier.action(tag) else {
        return;
    };
    match action {
        // one author per wrapped line
        TagAction::AppendAuthor => {
            for line in content {
                apply(record, action, line);
            }
        }
        _ => apply(record, action, &content.join(" ")),
    }
}

/// Normalize a raw value and store it; rejected values leave the field as it was
pub fn apply(record: &mut Record, action: TagAction, raw: &str) {
    match action {
        TagAction::AppendAuthor => {
            if let Some(author) = clean_text(raw) {
                record.push_author(&author);
            }
        }
        TagAction::MarkedDoi => {
            let doi = DOI_MARKER_RE
                .captures(raw)
                .and_then(|caps| normalize_doi(&caps[1]));
            if doi.is_some() {
                record.set(Field::Doi, doi);
            }
        }
        TagAction::Set(field) => {
            let value = normalize_field(field, raw);
            if value.is_some() {
                record.set(field, value);
            }
        }
    }
}

/// Run the normalizer that belongs to a canonical field
pub fn normalize_field(field: Field, raw: &str) -> Option<String> {
    match field {
        Field::Title | Field::Authors => clean_text(raw),
        Field::Year => extract_year(raw),
        Field::Doi => normalize_doi(raw),
        Field::Abstract => clean_abstract(raw),
    }
}

fn field_start<'a>(caps: &regex::Captures<'a>) -> LineKind<'a> {
    match caps.get(1) {
        Some(tag) => LineKind::FieldStart {
            tag: tag.as_str(),
            value: caps.get(2).map_or("", |value| value.as_str()),
        },
        None => LineKind::Ignore,
    }
}

fn is_indented(line: &str) -> bool {
    line.starts_with("  ") || line.starts_with('\t')
}

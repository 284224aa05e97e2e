use once_cell::sync::Lazy;
use regex::Regex;

static CITATION_EXPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Record #\d+ of \d+").unwrap());
static RECORD_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"RECORD \d+").unwrap());
static TITLE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^TITLE[ \t]*\r?$").unwrap());
/// A record terminator line: `ER`, optionally indented and followed by a dash
pub(crate) static ER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*ER[ \t]*(?:-[ \t]*)?\r?$").unwrap());

/// Line-leading labels of the "Field: value" layout, one pattern per label
static LABEL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^Authors?\s*:",
        r"(?im)^Title\s*:",
        r"(?im)^Year\s*:",
        r"(?im)^Abstract\s*:",
        r"(?im)^DOI\s*:",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Plain-text export layouts understood by the text parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// MEDLINE/PubMed `XX  - value` tag lines, records opened by `PMID-`
    TagPubmed,
    /// Two-letter tag lines with records closed by an `ER` line (Embase, Lilacs)
    TagErTerminated,
    /// `Title: ...`, `Authors: ...` label lines
    LabeledFullFields,
    /// `RECORD n` blocks with upper-case labels and indented values
    NumberedRecordBlock,
    /// `Record #n of m` blocks with `TI:`-style codes (Cochrane)
    CitationExportBlock,
}

impl Dialect {
    /// Classify a whole decoded file. Signatures can co-occur, so the checks
    /// run from most to least specific.
    pub fn detect(text: &str) -> Self {
        if CITATION_EXPORT_RE.is_match(text) {
            return Dialect::CitationExportBlock;
        }

        if RECORD_MARKER_RE.is_match(text) && TITLE_LINE_RE.is_match(text) {
            return Dialect::NumberedRecordBlock;
        }

        if ER_LINE_RE.is_match(text) {
            return Dialect::TagErTerminated;
        }

        let labels = LABEL_RES.iter().filter(|re| re.is_match(text)).count();
        if labels >= 2 {
            return Dialect::LabeledFullFields;
        }

        Dialect::TagPubmed
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::TagPubmed => write!(f, "tag-pubmed"),
            Dialect::TagErTerminated => write!(f, "tag-er-terminated"),
            Dialect::LabeledFullFields => write!(f, "labeled-full-fields"),
            Dialect::NumberedRecordBlock => write!(f, "numbered-record-block"),
            Dialect::CitationExportBlock => write!(f, "citation-export-block"),
        }
    }
}

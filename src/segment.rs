use crate::dialect::{Dialect, ER_LINE_RE};
use once_cell::sync::Lazy;
use regex::Regex;

static CITATION_EXPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Record #\d+ of \d+").unwrap());
static RECORD_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^RECORD \d+").unwrap());
static PMID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^PMID-").unwrap());

/// Split decoded text into raw record spans for the given dialect.
///
/// Spans are trimmed and never empty. Text before the first record marker is
/// dropped.
pub fn segment(text: &str, dialect: Dialect) -> Vec<&str> {
    let spans = match dialect {
        Dialect::CitationExportBlock => split_at_markers(text, &CITATION_EXPORT_RE),
        Dialect::NumberedRecordBlock => split_at_markers(text, &RECORD_MARKER_RE),
        Dialect::TagErTerminated => ER_LINE_RE.split(text).collect(),
        Dialect::TagPubmed => {
            if PMID_RE.is_match(text) {
                split_at_markers(text, &PMID_RE)
            } else {
                vec![text]
            }
        }
        Dialect::LabeledFullFields => vec![text],
    };

    spans
        .into_iter()
        .map(str::trim)
        .filter(|span| !span.is_empty())
        .collect()
}

/// Split RIS text on `ER  -` terminators preceded by a newline
pub fn split_ris_terminated(text: &str) -> Vec<&str> {
    static RIS_ER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\nER\s*-").unwrap());

    RIS_ER_RE
        .split(text)
        .map(str::trim)
        .filter(|span| !span.is_empty())
        .collect()
}

/// Each span runs from one marker to the start of the next, the last one to EOF
fn split_at_markers<'a>(text: &'a str, marker: &Regex) -> Vec<&'a str> {
    let starts: Vec<usize> = marker.find_iter(text).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_export_spans() {
        let text = "Header line\nRecord #1 of 2\nTI: First\n\nRecord #2 of 2\nTI: Second\n";
        let spans = segment(text, Dialect::CitationExportBlock);
        assert_eq!(spans.len(), 2);
        assert!(spans[0].starts_with("Record #1 of 2"));
        assert!(spans[0].contains("First"));
        assert!(!spans[0].contains("Second"));
        assert_eq!(spans[1], "Record #2 of 2\nTI: Second");
    }

    #[test]
    fn test_numbered_record_spans() {
        let text = "RECORD 1\nTITLE\n  One\nRECORD 2\nTITLE\n  Two\n";
        let spans = segment(text, Dialect::NumberedRecordBlock);
        assert_eq!(spans, vec!["RECORD 1\nTITLE\n  One", "RECORD 2\nTITLE\n  Two"]);
    }

    #[test]
    fn test_er_terminated_spans() {
        let text = "TI  - One\nER  -\n\nTI  - Two\nER\n\n\nER\n";
        let spans = segment(text, Dialect::TagErTerminated);
        assert_eq!(spans, vec!["TI  - One", "TI  - Two"]);
    }

    #[test]
    fn test_pubmed_spans() {
        let text = "PMID- 1\nTI  - One\n\nPMID- 2\nTI  - Two\n";
        let spans = segment(text, Dialect::TagPubmed);
        assert_eq!(spans.len(), 2);
        assert!(spans[1].starts_with("PMID- 2"));
    }

    #[test]
    fn test_pubmed_without_marker_is_single_span() {
        let text = "TI  - Lonely record\nAU  - Smith J\n";
        assert_eq!(segment(text, Dialect::TagPubmed).len(), 1);
        assert!(segment("  \n\n", Dialect::TagPubmed).is_empty());
    }

    #[test]
    fn test_labeled_fields_single_span() {
        let text = "Title: A\nAuthors: B\n";
        assert_eq!(segment(text, Dialect::LabeledFullFields), vec!["Title: A\nAuthors: B"]);
    }

    #[test]
    fn test_split_ris_terminated() {
        let text = "TY  - JOUR\nTI  - One\nER  - \nTY  - JOUR\nTI  - Two\nER  -\n";
        let spans = split_ris_terminated(text);
        assert_eq!(spans.len(), 2);
        assert!(spans[1].contains("Two"));
    }
}

//! Field cleaning shared by every parser.
//!
//! All functions here are pure: the same raw value normalizes to the same
//! result no matter which dialect produced it, so DOIs and years coming from
//! different databases compare equal.

use once_cell::sync::Lazy;
use regex::Regex;

/// Abstracts at or below this many characters are treated as noise ("N/A", "[none]")
const MIN_ABSTRACT_CHARS: usize = 10;

/// Resolver and label prefixes removed from the front of a DOI
const DOI_PREFIXES: [&str; 6] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "doi:",
];

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.[0-9]+/.+").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)[0-9]{2}\b").unwrap());
static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
/// Control and format characters: soft hyphens, zero-width spaces and joiners, BOMs
static INVISIBLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{Cc}\p{Cf}]+").unwrap());

/// Canonicalize a DOI, or return `None` when it does not look like one.
///
/// Leading `doi:` labels and resolver URLs are removed, surrounding whitespace
/// and trailing `.`, `,`, `;` are trimmed. Case is preserved; use [`doi_key`]
/// for comparisons.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();

    // Prefixes can stack ("doi: https://doi.org/10...")
    while let Some(rest) = DOI_PREFIXES
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(doi, prefix))
    {
        doi = rest.trim_start();
    }

    let doi = doi.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';') || c.is_whitespace());

    if DOI_RE.is_match(doi) {
        Some(doi.to_string())
    } else {
        None
    }
}

/// Case-folded form of a DOI used as an equality key
pub fn doi_key(doi: &str) -> String {
    doi.to_lowercase()
}

/// Strip markup and whitespace noise from an abstract.
///
/// Returns `None` when ten characters or fewer remain.
pub fn clean_abstract(raw: &str) -> Option<String> {
    let without_markup = MARKUP_RE.replace_all(raw, "");
    let cleaned = collapse_whitespace(&without_markup);

    if cleaned.chars().count() > MIN_ABSTRACT_CHARS {
        Some(cleaned)
    } else {
        None
    }
}

/// Pull a four-digit year out of a date-like string.
///
/// The first standalone `19xx`/`20xx` wins; failing that, an input that is
/// exactly four digits is accepted as is.
pub fn extract_year(raw: &str) -> Option<String> {
    if let Some(m) = YEAR_RE.find(raw) {
        return Some(m.as_str().to_string());
    }

    let trimmed = raw.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Collapse whitespace and drop invisible characters; `None` if nothing is left
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = collapse_whitespace(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Normalize a title for comparison: lowercase, no punctuation, single spaces
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace()
        .map(|word| INVISIBLE_RE.replace_all(word, ""))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi_prefixes() {
        assert_eq!(
            normalize_doi("doi:10.1000/xyz123").as_deref(),
            Some("10.1000/xyz123")
        );
        assert_eq!(
            normalize_doi("DOI: 10.1000/xyz123").as_deref(),
            Some("10.1000/xyz123")
        );
        assert_eq!(
            normalize_doi("https://doi.org/10.1000/ABC.def").as_deref(),
            Some("10.1000/ABC.def")
        );
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1000/abc").as_deref(),
            Some("10.1000/abc")
        );
    }

    #[test]
    fn test_normalize_doi_trailing_punctuation() {
        assert_eq!(
            normalize_doi("  10.1016/j.cell.2020.01.001.;, ").as_deref(),
            Some("10.1016/j.cell.2020.01.001")
        );
    }

    #[test]
    fn test_normalize_doi_rejects_garbage() {
        assert_eq!(normalize_doi(""), None);
        assert_eq!(normalize_doi("not a doi"), None);
        assert_eq!(normalize_doi("10.1000/"), None);
        assert_eq!(normalize_doi("11.1000/abc"), None);
        assert_eq!(normalize_doi("doi10x/abc"), None);
    }

    #[test]
    fn test_normalize_doi_is_projection() {
        for raw in [
            "doi: https://doi.org/10.1000/xyz.",
            "10.1000/xyz123",
            "DOI:10.5555/ABC;",
        ] {
            let once = normalize_doi(raw).unwrap();
            assert_eq!(normalize_doi(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_doi_key_folds_case() {
        assert_eq!(doi_key("10.1000/ABC"), doi_key("10.1000/abc"));
    }

    #[test]
    fn test_clean_abstract() {
        assert_eq!(
            clean_abstract("<p>Background: this study...</p>").as_deref(),
            Some("Background: this study...")
        );
        assert_eq!(
            clean_abstract("Line one\n   line\ttwo\u{0007} end").as_deref(),
            Some("Line one line two end")
        );
        // eight characters after stripping
        assert_eq!(clean_abstract("<b>12345678</b>"), None);
        assert_eq!(clean_abstract("N/A"), None);
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2019 Mar").as_deref(), Some("2019"));
        assert_eq!(extract_year("Published 1998-05-01").as_deref(), Some("1998"));
        assert_eq!(extract_year(" 1850 ").as_deref(), Some("1850"));
        assert_eq!(extract_year("Spring"), None);
        assert_eq!(extract_year("12345"), None);
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  Effects of X on   Y. "),
            "effects of x on y"
        );
        assert_eq!(normalize_title("COVID-19: a review"), "covid19 a review");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(" \n\t "), None);
        assert_eq!(clean_text(" A  title\nsplit ").as_deref(), Some("A title split"));
        assert_eq!(
            clean_text("Zero\u{200b}width \u{00ad}\u{2060} title").as_deref(),
            Some("Zerowidth title")
        );
        assert_eq!(clean_text("\u{feff}\u{200e}"), None);
    }

    #[test]
    fn test_invisible_abstract_is_rejected() {
        let invisible = format!("{}\u{feff}", "\u{feff}\u{200b}".repeat(5));
        assert_eq!(clean_abstract(&invisible), None);
        assert_eq!(
            clean_abstract("\u{feff}Results were\u{200b} consistent.").as_deref(),
            Some("Results were consistent.")
        );
    }
}

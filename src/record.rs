use serde::{Deserialize, Serialize};

/// Text emitted in place of a missing field at the export boundary
pub const UNKNOWN: &str = "Sem informação";

/// Column headers, in export order
pub const COLUMNS: [&str; 6] = ["Title", "Authors", "Year", "DOI", "Abstract", "source_file"];

/// Normalized article record produced by every parser
///
/// Each field is either `None` or a non-empty, trimmed string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Article title
    pub title: Option<String>,
    /// Authors, comma-joined in the order they appeared
    pub authors: Option<String>,
    /// Four-digit publication year
    pub year: Option<String>,
    /// DOI as found in the source, without resolver prefixes
    pub doi: Option<String>,
    /// Cleaned abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Name of the file the record was read from
    pub source_file: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when at least one bibliographic field is known
    pub fn has_content(&self) -> bool {
        Field::ALL.iter().any(|field| self.get(*field).is_some())
    }

    /// Store a value, mapping empty or blank input to `None`
    pub fn set(&mut self, field: Field, value: Option<String>) {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        *self.slot_mut(field) = value;
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Title => self.title.as_deref(),
            Field::Authors => self.authors.as_deref(),
            Field::Year => self.year.as_deref(),
            Field::Doi => self.doi.as_deref(),
            Field::Abstract => self.abstract_text.as_deref(),
        }
    }

    /// Append an author to the comma-joined list
    pub fn push_author(&mut self, author: &str) {
        let author = author.trim();
        if author.is_empty() {
            return;
        }
        match &mut self.authors {
            Some(authors) => {
                authors.push_str(", ");
                authors.push_str(author);
            }
            None => self.authors = Some(author.to_string()),
        }
    }

    /// Export row in `COLUMNS` order, with missing values replaced by `UNKNOWN`
    pub fn to_row(&self) -> [&str; 6] {
        [
            display(&self.title),
            display(&self.authors),
            display(&self.year),
            display(&self.doi),
            display(&self.abstract_text),
            display(&self.source_file),
        ]
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Authors => &mut self.authors,
            Field::Year => &mut self.year,
            Field::Doi => &mut self.doi,
            Field::Abstract => &mut self.abstract_text,
        }
    }
}

/// Render an optional field with the export sentinel
pub fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}

/// Canonical bibliographic fields every dialect maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Authors,
    Year,
    Doi,
    Abstract,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Title,
        Field::Authors,
        Field::Year,
        Field::Doi,
        Field::Abstract,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_stay_unknown() {
        let mut record = Record::new();
        record.set(Field::Title, Some("   ".to_string()));
        assert_eq!(record.title, None);
        assert!(!record.has_content());

        record.set(Field::Title, Some("  A Title ".to_string()));
        assert_eq!(record.title.as_deref(), Some("A Title"));
        assert!(record.has_content());
    }

    #[test]
    fn authors_are_joined_in_order() {
        let mut record = Record::new();
        record.push_author("Smith J");
        record.push_author("");
        record.push_author("Doe A");
        record.push_author("Smith J");
        assert_eq!(record.authors.as_deref(), Some("Smith J, Doe A, Smith J"));
    }

    #[test]
    fn row_uses_sentinel_for_missing_fields() {
        let mut record = Record::new();
        record.year = Some("2020".to_string());
        let row = record.to_row();
        assert_eq!(row[0], UNKNOWN);
        assert_eq!(row[2], "2020");
        assert_eq!(row.len(), COLUMNS.len());
    }
}

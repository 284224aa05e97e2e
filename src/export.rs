//! Table export of merged records, the deduplication audit and a coverage summary.

use crate::dedup::AuditEntry;
use crate::record::{display, Record, COLUMNS};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output table format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn writer(&self) -> Box<dyn TableWriter> {
        match self {
            ExportFormat::Csv => Box::new(CsvTableWriter),
            ExportFormat::Json => Box::new(JsonTableWriter),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown format '{}' (expected csv or json)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Field coverage of a record set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub with_title: usize,
    pub with_authors: usize,
    pub with_year: usize,
    pub with_doi: usize,
    pub with_abstract: usize,
    /// Records per source file
    pub per_file: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_records(records: &[Record]) -> Self {
        let mut summary = Summary {
            total: records.len(),
            ..Summary::default()
        };

        for record in records {
            summary.with_title += record.title.is_some() as usize;
            summary.with_authors += record.authors.is_some() as usize;
            summary.with_year += record.year.is_some() as usize;
            summary.with_doi += record.doi.is_some() as usize;
            summary.with_abstract += record.abstract_text.is_some() as usize;
            *summary
                .per_file
                .entry(display(&record.source_file).to_string())
                .or_default() += 1;
        }

        summary
    }

    /// Labelled counts in display order
    pub fn metrics(&self) -> [(&'static str, usize); 6] {
        [
            ("Total de Artigos", self.total),
            ("Artigos com Título", self.with_title),
            ("Artigos com Autores", self.with_authors),
            ("Artigos com Ano", self.with_year),
            ("Artigos com DOI", self.with_doi),
            ("Artigos com Resumo", self.with_abstract),
        ]
    }
}

/// Serializes tables to bytes
pub trait TableWriter {
    /// Record table with the `Title, Authors, Year, DOI, Abstract, source_file` columns
    fn write_records(&self, records: &[Record]) -> Result<Vec<u8>, ExportError>;

    /// One row per removed duplicate
    fn write_audit(&self, audit: &[AuditEntry]) -> Result<Vec<u8>, ExportError>;

    /// Metric/count table
    fn write_summary(&self, summary: &Summary) -> Result<Vec<u8>, ExportError>;

    fn format(&self) -> ExportFormat;
}

/// Record row with the unknown sentinel filled in
#[derive(Serialize)]
struct RecordRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Authors")]
    authors: &'a str,
    #[serde(rename = "Year")]
    year: &'a str,
    #[serde(rename = "DOI")]
    doi: &'a str,
    #[serde(rename = "Abstract")]
    abstract_text: &'a str,
    source_file: &'a str,
}

impl<'a> From<&'a Record> for RecordRow<'a> {
    fn from(record: &'a Record) -> Self {
        let [title, authors, year, doi, abstract_text, source_file] = record.to_row();
        RecordRow {
            title,
            authors,
            year,
            doi,
            abstract_text,
            source_file,
        }
    }
}

#[derive(Serialize)]
struct AuditRow<'a> {
    removed_index: usize,
    kept_index: usize,
    linked_via: usize,
    removed_score: u32,
    kept_score: u32,
    reason: String,
    #[serde(flatten)]
    record: RecordRow<'a>,
}

impl<'a> From<&'a AuditEntry> for AuditRow<'a> {
    fn from(entry: &'a AuditEntry) -> Self {
        AuditRow {
            removed_index: entry.index,
            kept_index: entry.kept_index,
            linked_via: entry.linked_via,
            removed_score: entry.removed_score,
            kept_score: entry.kept_score,
            reason: entry.reason(),
            record: RecordRow::from(&entry.record),
        }
    }
}

const AUDIT_COLUMNS: [&str; 6] = [
    "removed_index",
    "kept_index",
    "linked_via",
    "removed_score",
    "kept_score",
    "reason",
];

pub struct CsvTableWriter;

impl TableWriter for CsvTableWriter {
    fn write_records(&self, records: &[Record]) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(COLUMNS)?;
        for record in records {
            writer.write_record(record.to_row())?;
        }
        into_bytes(writer)
    }

    fn write_audit(&self, audit: &[AuditEntry]) -> Result<Vec<u8>, ExportError> {
        // csv cannot serialize flattened structs
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(AUDIT_COLUMNS.iter().chain(COLUMNS.iter()))?;
        for entry in audit {
            let mut row = vec![
                entry.index.to_string(),
                entry.kept_index.to_string(),
                entry.linked_via.to_string(),
                entry.removed_score.to_string(),
                entry.kept_score.to_string(),
                entry.reason(),
            ];
            row.extend(entry.record.to_row().iter().map(|v| v.to_string()));
            writer.write_record(&row)?;
        }
        into_bytes(writer)
    }

    fn write_summary(&self, summary: &Summary) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Métrica", "Contagem"])?;
        for (label, count) in summary.metrics() {
            writer.write_record([label.to_string(), count.to_string()])?;
        }
        for (file, count) in &summary.per_file {
            writer.write_record([format!("Artigos de {}", file), count.to_string()])?;
        }
        into_bytes(writer)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

pub struct JsonTableWriter;

impl TableWriter for JsonTableWriter {
    fn write_records(&self, records: &[Record]) -> Result<Vec<u8>, ExportError> {
        let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
        Ok(serde_json::to_vec_pretty(&rows)?)
    }

    fn write_audit(&self, audit: &[AuditEntry]) -> Result<Vec<u8>, ExportError> {
        let rows: Vec<AuditRow> = audit.iter().map(AuditRow::from).collect();
        Ok(serde_json::to_vec_pretty(&rows)?)
    }

    fn write_summary(&self, summary: &Summary) -> Result<Vec<u8>, ExportError> {
        Ok(serde_json::to_vec_pretty(summary)?)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

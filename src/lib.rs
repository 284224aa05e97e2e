pub mod cache;
pub mod dedup;
pub mod dialect;
pub mod export;
pub mod extract;
pub mod fetchers;
pub mod normalize;
pub mod parser;
pub mod record;
pub mod report;
pub mod ris;
pub mod segment;

use cache::{Cache, CacheError};
use dedup::{deduplicate, AuditEntry};
use fetchers::{
    crossref::CrossRefClient, pubmed::PubMedClient, AbstractFetcher, AbstractSource, FetchConfig,
    FetchError,
};
use parser::{parse_file, ContainerKind};
use record::Record;

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("No valid input files (expected non-empty .ris or .txt files)")]
    NoValidInputs,
    #[error("Failed to open cache: {0}")]
    Cache(#[from] CacheError),
    #[error("Failed to set up abstract lookup: {0}")]
    Fetch(#[from] FetchError),
}

/// Configuration for a merge run
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub fetch_abstracts: bool,
    pub use_crossref: bool,
    pub use_pubmed: bool,
    pub cache_enabled: bool,
    pub deduplicate: bool,
    pub show_progress: bool,
    pub fetch: FetchConfig,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fetch_abstracts: false,
            use_crossref: true,
            use_pubmed: true,
            cache_enabled: true,
            deduplicate: true,
            show_progress: true,
            fetch: FetchConfig::default(),
        }
    }
}

/// Per-file parse result
#[derive(Debug, Clone)]
pub struct FileReport {
    pub name: String,
    pub records: usize,
    pub error: Option<String>,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Surviving records in input order
    pub records: Vec<Record>,
    /// Audit of the records removed as duplicates
    pub removed: Vec<AuditEntry>,
    pub files: Vec<FileReport>,
    /// Inputs rejected before parsing
    pub invalid: Vec<PathBuf>,
    /// Records extracted before deduplication
    pub parsed: usize,
    /// Abstracts filled by lookup
    pub backfilled: usize,
}

/// Split inputs into usable files and rejected ones. A usable file has a
/// `.ris`/`.txt` extension and is not empty.
pub fn validate_inputs(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    paths.iter().cloned().partition(|path| {
        let known = ContainerKind::from_filename(&file_name(path)).is_some();
        let non_empty = fs::metadata(path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);
        known && non_empty
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Drives parsing, abstract backfill and deduplication
pub struct BibMerger {
    config: MergeConfig,
    fetcher: Option<AbstractFetcher>,
}

impl BibMerger {
    pub fn new(config: MergeConfig) -> Result<Self, MergeError> {
        let fetcher = if config.fetch_abstracts {
            let mut sources: Vec<Box<dyn AbstractSource>> = Vec::new();
            if config.use_crossref {
                sources.push(Box::new(CrossRefClient::new(config.fetch.clone())?));
            }
            if config.use_pubmed {
                sources.push(Box::new(PubMedClient::new(config.fetch.clone())?));
            }
            let cache = if config.cache_enabled {
                Some(Cache::new()?)
            } else {
                None
            };
            Some(AbstractFetcher::new(sources, cache))
        } else {
            None
        };

        Ok(Self { config, fetcher })
    }

    /// Use a prepared fetcher instead of the configured sources
    pub fn with_fetcher(config: MergeConfig, fetcher: AbstractFetcher) -> Self {
        Self {
            config,
            fetcher: Some(fetcher),
        }
    }

    /// Parse every file and concatenate the records, tagging each with its file name.
    /// A file that cannot be read is reported and skipped.
    pub fn merge_files(&self, paths: &[PathBuf]) -> (Vec<Record>, Vec<FileReport>) {
        let mut all_records = Vec::new();
        let mut files = Vec::new();

        for path in paths {
            let name = file_name(path);
            match parse_file(path) {
                Ok(mut records) => {
                    debug!("Parsed {} records from {}", records.len(), name);
                    for record in &mut records {
                        record.source_file = Some(name.clone());
                    }
                    files.push(FileReport {
                        name,
                        records: records.len(),
                        error: None,
                    });
                    all_records.extend(records);
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}", name, e);
                    files.push(FileReport {
                        name,
                        records: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        (all_records, files)
    }

    /// Validate, parse, backfill and deduplicate the given inputs
    pub async fn run(&self, paths: &[PathBuf]) -> Result<MergeOutcome, MergeError> {
        let (valid, invalid) = validate_inputs(paths);
        for path in &invalid {
            warn!("Skipping invalid input {}", path.display());
        }
        if valid.is_empty() {
            return Err(MergeError::NoValidInputs);
        }

        let (mut records, files) = self.merge_files(&valid);
        let parsed = records.len();

        let backfilled = match &self.fetcher {
            Some(fetcher) if fetcher.has_sources() => self.backfill(fetcher, &mut records).await,
            _ => 0,
        };

        let (records, removed) = if self.config.deduplicate {
            let result = deduplicate(records);
            (result.records, result.removed)
        } else {
            (records, Vec::new())
        };

        Ok(MergeOutcome {
            records,
            removed,
            files,
            invalid,
            parsed,
            backfilled,
        })
    }

    async fn backfill(&self, fetcher: &AbstractFetcher, records: &mut [Record]) -> usize {
        let pb = if self.config.show_progress {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut looked_up = 0u64;
        let fetched = fetcher
            .backfill(records, |_, total, doi| {
                pb.set_length(total as u64);
                pb.set_position(looked_up);
                pb.set_message(doi.to_string());
                looked_up += 1;
            })
            .await;

        pb.finish_with_message(format!("{} abstracts found", fetched));
        fetched
    }
}

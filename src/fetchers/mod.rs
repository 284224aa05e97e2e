pub use async_trait::async_trait;

pub mod crossref;
pub mod pubmed;

use crate::cache::Cache;
use crate::normalize::clean_abstract;
use crate::record::Record;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = "bibmerge/0.1.0 (mailto:researcher@example.com)";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Rate limited, try again later")]
    RateLimited,
}

/// Network behaviour shared by all abstract sources
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts per request, including the first
    pub retries: u32,
    /// Pause after each completed lookup
    pub delay: Duration,
    /// Pause before retrying after a transport error
    pub retry_delay: Duration,
    /// Rate-limit backoff is `backoff_base * 2^attempt`
    pub backoff_base: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            delay: Duration::from_millis(500),
            retry_delay: Duration::from_secs(1),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl FetchConfig {
    pub(crate) fn client(&self) -> Result<Client, FetchError> {
        Ok(Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?)
    }

    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

/// A service that can look up an article abstract by DOI
#[async_trait]
pub trait AbstractSource: Send + Sync {
    /// Raw abstract text for `doi`, or `None` when the service has none
    async fn fetch_abstract(&self, doi: &str) -> Result<Option<String>, FetchError>;

    /// Get the name of this source
    fn name(&self) -> &'static str;
}

/// Tries each source in order, consulting the cache first
pub struct AbstractFetcher {
    sources: Vec<Box<dyn AbstractSource>>,
    cache: Option<Cache>,
}

impl AbstractFetcher {
    pub fn new(sources: Vec<Box<dyn AbstractSource>>, cache: Option<Cache>) -> Self {
        Self { sources, cache }
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Look up a cleaned abstract for `doi`. Source failures are logged and
    /// the next source is tried.
    pub async fn fetch(&self, doi: &str) -> Option<String> {
        for source in &self.sources {
            if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(source.name(), doi)) {
                debug!("Cache hit for {} in {}", doi, source.name());
                return Some(cached);
            }

            match source.fetch_abstract(doi).await {
                Ok(Some(raw)) => {
                    let Some(text) = clean_abstract(&raw) else {
                        continue;
                    };
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.set(source.name(), doi, &text) {
                            warn!("Failed to cache abstract for {}: {}", doi, e);
                        }
                    }
                    return Some(text);
                }
                Ok(None) => {}
                Err(e) => warn!("{} lookup failed for {}: {}", source.name(), doi, e),
            }
        }
        None
    }

    /// Fill missing abstracts of records that have a DOI.
    ///
    /// `progress(fetched, total, doi)` is called before each lookup. Returns
    /// the number of abstracts filled.
    pub async fn backfill<F>(&self, records: &mut [Record], mut progress: F) -> usize
    where
        F: FnMut(usize, usize, &str),
    {
        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.abstract_text.is_none() && r.doi.is_some())
            .map(|(idx, _)| idx)
            .collect();

        let total = pending.len();
        let mut fetched = 0;

        for idx in pending {
            let Some(doi) = records[idx].doi.clone() else {
                continue;
            };
            progress(fetched, total, &doi);

            if let Some(text) = self.fetch(&doi).await {
                records[idx].abstract_text = Some(text);
                fetched += 1;
            }
        }

        debug!("Backfilled {} of {} missing abstracts", fetched, total);
        fetched
    }
}

#[cfg(test)]
pub(crate) fn no_wait() -> FetchConfig {
    FetchConfig {
        timeout: Duration::from_secs(5),
        retries: 3,
        delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        backoff_base: Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Canned source that records the DOIs it was asked for
    struct FakeSource {
        name: &'static str,
        answers: HashMap<&'static str, &'static str>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(name: &'static str, answers: &[(&'static str, &'static str)]) -> Self {
            Self {
                name,
                answers: answers.iter().copied().collect(),
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, &[])
            }
        }
    }

    #[async_trait]
    impl AbstractSource for Arc<FakeSource> {
        async fn fetch_abstract(&self, doi: &str) -> Result<Option<String>, FetchError> {
            self.calls.lock().unwrap().push(doi.to_string());
            if self.fail {
                return Err(FetchError::RateLimited);
            }
            Ok(self.answers.get(doi).map(|s| s.to_string()))
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn record(doi: Option<&str>, abstract_text: Option<&str>) -> Record {
        Record {
            title: Some("Some title".to_string()),
            doi: doi.map(str::to_string),
            abstract_text: abstract_text.map(str::to_string),
            ..Record::default()
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_second_source() {
        let first = Arc::new(FakeSource::new("first", &[]));
        let second = Arc::new(FakeSource::new(
            "second",
            &[("10.1/a", "<p>An abstract long enough to keep.</p>")],
        ));
        let fetcher = AbstractFetcher::new(
            vec![Box::new(first.clone()), Box::new(second.clone())],
            None,
        );

        assert_eq!(
            fetcher.fetch("10.1/a").await.as_deref(),
            Some("An abstract long enough to keep.")
        );
        assert_eq!(first.calls.lock().unwrap().len(), 1);
        assert_eq!(second.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_fatal() {
        let broken = Arc::new(FakeSource::failing("broken"));
        let good = Arc::new(FakeSource::new(
            "good",
            &[("10.1/a", "Recovered abstract text here.")],
        ));
        let fetcher = AbstractFetcher::new(vec![Box::new(broken), Box::new(good)], None);

        assert_eq!(
            fetcher.fetch("10.1/a").await.as_deref(),
            Some("Recovered abstract text here.")
        );
        assert_eq!(fetcher.fetch("10.1/missing").await, None);
    }

    #[tokio::test]
    async fn test_backfill_only_touches_missing_abstracts() {
        let source = Arc::new(FakeSource::new(
            "fake",
            &[
                ("10.1/a", "Fetched abstract number one."),
                ("10.1/b", "Fetched abstract number two."),
            ],
        ));
        let fetcher = AbstractFetcher::new(vec![Box::new(source.clone())], None);

        let mut records = vec![
            record(Some("10.1/a"), None),
            record(Some("10.1/b"), Some("Already present")),
            record(None, None),
            record(Some("10.1/c"), None),
        ];

        let mut seen = Vec::new();
        let filled = fetcher
            .backfill(&mut records, |done, total, doi| {
                seen.push((done, total, doi.to_string()))
            })
            .await;

        assert_eq!(filled, 1);
        assert_eq!(
            seen,
            vec![(0, 2, "10.1/a".to_string()), (1, 2, "10.1/c".to_string())]
        );
        assert_eq!(
            records[0].abstract_text.as_deref(),
            Some("Fetched abstract number one.")
        );
        assert_eq!(records[1].abstract_text.as_deref(), Some("Already present"));
        assert_eq!(records[3].abstract_text, None);
        assert_eq!(source.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_source() {
        let dir = tempdir().unwrap();
        let source = Arc::new(FakeSource::new(
            "fake",
            &[("10.1/a", "Cached abstract text value.")],
        ));
        let fetcher = AbstractFetcher::new(
            vec![Box::new(source.clone())],
            Some(Cache::in_dir(dir.path()).unwrap()),
        );

        let first = fetcher.fetch("10.1/a").await;
        let second = fetcher.fetch("10.1/a").await;
        assert_eq!(first, second);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = FetchConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
    }
}

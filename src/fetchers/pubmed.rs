use super::{async_trait, AbstractSource, FetchConfig, FetchError};
use crate::normalize::collapse_whitespace;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const PUBMED_API_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// NCBI E-utilities client: DOI → PMID via esearch, then abstract via efetch
pub struct PubMedClient {
    client: Client,
    base_url: String,
    config: FetchConfig,
}

impl PubMedClient {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        Self::with_base_url(PUBMED_API_BASE, config)
    }

    pub fn with_base_url(base_url: &str, config: FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: config.client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Find the PubMed id for a DOI
    pub async fn search_pmid(&self, doi: &str) -> Result<Option<String>, FetchError> {
        let url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmode=json&retmax=1",
            self.base_url,
            urlencoding::encode(&format!("{}[doi]", doi))
        );

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            tokio::time::sleep(self.config.delay).await;
            return Ok(None);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::ParseError(e.to_string()))?;
        tokio::time::sleep(self.config.delay).await;

        Ok(body.esearchresult.idlist.into_iter().next())
    }

    /// Fetch the abstract of a PubMed article
    pub async fn fetch_by_pmid(&self, pmid: &str) -> Result<Option<String>, FetchError> {
        let url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml&rettype=abstract",
            self.base_url,
            urlencoding::encode(pmid)
        );

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            tokio::time::sleep(self.config.delay).await;
            return Ok(None);
        }

        let text = response.text().await?;
        tokio::time::sleep(self.config.delay).await;

        parse_abstract_xml(&text)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[async_trait]
impl AbstractSource for PubMedClient {
    async fn fetch_abstract(&self, doi: &str) -> Result<Option<String>, FetchError> {
        let Some(pmid) = self.search_pmid(doi).await? else {
            return Ok(None);
        };
        self.fetch_by_pmid(&pmid).await
    }

    fn name(&self) -> &'static str {
        "PubMed"
    }
}

/// Concatenate every `AbstractText` section of an efetch document.
/// Inline markup inside a section is flattened into its text.
fn parse_abstract_xml(xml: &str) -> Result<Option<String>, FetchError> {
    let mut reader = Reader::from_str(xml);

    let mut sections = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if depth > 0 {
                    depth += 1;
                } else if e.name().as_ref() == b"AbstractText" {
                    depth = 1;
                    current.clear();
                }
            }
            Ok(Event::End(_)) if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let section = collapse_whitespace(&current);
                    if !section.is_empty() {
                        sections.push(section);
                    }
                }
            }
            Ok(Event::Text(ref e)) if depth > 0 => {
                let text = e
                    .unescape()
                    .map_err(|e| FetchError::ParseError(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(ref e)) if depth > 0 => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::ParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if sections.is_empty() {
        Ok(None)
    } else {
        Ok(Some(sections.join(" ")))
    }
}

use super::{async_trait, AbstractSource, FetchConfig, FetchError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

pub struct CrossRefClient {
    client: Client,
    base_url: String,
    config: FetchConfig,
}

impl CrossRefClient {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        Self::with_base_url(CROSSREF_API_BASE, config)
    }

    pub fn with_base_url(base_url: &str, config: FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: config.client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CrossRefResponse {
    message: CrossRefWork,
}

#[derive(Debug, Deserialize)]
struct CrossRefWork {
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[async_trait]
impl AbstractSource for CrossRefClient {
    async fn fetch_abstract(&self, doi: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/works/{}", self.base_url, doi);
        let attempts = self.config.retries.max(1);

        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) if !last => {
                    debug!("CrossRef request for {} failed, retrying: {}", doi, e);
                    tokio::time::sleep(self.config.retry_delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS if last => return Err(FetchError::RateLimited),
                StatusCode::TOO_MANY_REQUESTS => {
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                }
                status if status.is_success() => {
                    let body: CrossRefResponse = response
                        .json()
                        .await
                        .map_err(|e| FetchError::ParseError(e.to_string()))?;
                    tokio::time::sleep(self.config.delay).await;
                    return Ok(body.message.abstract_text);
                }
                status => {
                    debug!("CrossRef returned {} for {}", status, doi);
                    tokio::time::sleep(self.config.delay).await;
                    return Ok(None);
                }
            }
        }

        Ok(None)
    }

    fn name(&self) -> &'static str {
        "CrossRef"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::no_wait;
    use mockito::Server;

    #[tokio::test]
    async fn test_crossref_fetch_abstract() {
        let mut server = Server::new_async().await;

        let _m = server
            .mock("GET", "/works/10.1000/xyz123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "status": "ok",
                "message": {
                    "DOI": "10.1000/xyz123",
                    "title": ["Effects of X on Y"],
                    "abstract": "<jats:p>We measured the effect of X on Y.</jats:p>"
                }
            }"#,
            )
            .create_async()
            .await;

        let client = CrossRefClient::with_base_url(&server.url(), no_wait()).unwrap();
        let result = client.fetch_abstract("10.1000/xyz123").await.unwrap();

        assert_eq!(
            result.as_deref(),
            Some("<jats:p>We measured the effect of X on Y.</jats:p>")
        );
    }

    #[tokio::test]
    async fn test_crossref_without_abstract() {
        let mut server = Server::new_async().await;

        let _m = server
            .mock("GET", "/works/10.1000/none")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "ok", "message": {"DOI": "10.1000/none"}}"#)
            .create_async()
            .await;

        let client = CrossRefClient::with_base_url(&server.url(), no_wait()).unwrap();
        assert_eq!(client.fetch_abstract("10.1000/none").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_crossref_not_found() {
        let mut server = Server::new_async().await;

        let m = server
            .mock("GET", "/works/10.1000/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = CrossRefClient::with_base_url(&server.url(), no_wait()).unwrap();
        assert_eq!(client.fetch_abstract("10.1000/missing").await.unwrap(), None);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_crossref_rate_limit_retries_then_fails() {
        let mut server = Server::new_async().await;

        let m = server
            .mock("GET", "/works/10.1000/busy")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = CrossRefClient::with_base_url(&server.url(), no_wait()).unwrap();
        let result = client.fetch_abstract("10.1000/busy").await;

        assert!(matches!(result, Err(FetchError::RateLimited)));
        m.assert_async().await;
    }
}

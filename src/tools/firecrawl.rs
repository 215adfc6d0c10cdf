use super::{PageScraper, WebSearch};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    FirecrawlDocument, FirecrawlScrapeOptions, FirecrawlScrapeRequest, FirecrawlScrapeResponse,
    FirecrawlSearchRequest, FirecrawlSearchResponse, ScrapedPage, SearchHit,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";
const SERVICE: &str = "firecrawl";

/// Firecrawl search + scrape client.
#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: FIRECRAWL_API_URL.to_string(),
        }
    }

    pub fn from_env() -> ServiceResult<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY")
            .map_err(|_| ServiceError::MissingCredential("FIRECRAWL_API_KEY"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> ServiceResult<R> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| ServiceError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl WebSearch for FirecrawlClient {
    async fn search(&self, query: &str, limit: usize) -> ServiceResult<Vec<SearchHit>> {
        let request = FirecrawlSearchRequest {
            query: query.to_string(),
            limit,
            scrape_options: FirecrawlScrapeOptions {
                formats: vec!["markdown".to_string()],
            },
        };
        let response: FirecrawlSearchResponse = self.post("search", &request).await?;
        let hits = normalize_search(response, limit)?;
        debug!("firecrawl returned {} hits for {:?}", hits.len(), query);
        Ok(hits)
    }
}

#[async_trait]
impl PageScraper for FirecrawlClient {
    async fn scrape(&self, url: &str) -> ServiceResult<ScrapedPage> {
        let request = FirecrawlScrapeRequest {
            url: url.to_string(),
            formats: vec!["markdown".to_string()],
        };
        let response: FirecrawlScrapeResponse = self.post("scrape", &request).await?;
        normalize_scrape(url, response)
    }
}

fn normalize_search(response: FirecrawlSearchResponse, limit: usize) -> ServiceResult<Vec<SearchHit>> {
    if !response.success {
        return Err(ServiceError::Rejected {
            service: SERVICE,
            message: response.error.unwrap_or_else(|| "search unsuccessful".to_string()),
        });
    }

    Ok(response
        .data
        .into_iter()
        .filter_map(into_hit)
        .take(limit)
        .collect())
}

fn into_hit(document: FirecrawlDocument) -> Option<SearchHit> {
    let metadata = document.metadata.unwrap_or_default();
    let url = document
        .url
        .or(metadata.source_url)
        .filter(|u| !u.trim().is_empty())?;

    Some(SearchHit {
        url,
        title: document.title.or(metadata.title),
        description: document.description.or(metadata.description),
        markdown: document.markdown.filter(|m| !m.trim().is_empty()),
    })
}

fn normalize_scrape(url: &str, response: FirecrawlScrapeResponse) -> ServiceResult<ScrapedPage> {
    if !response.success {
        return Err(ServiceError::Rejected {
            service: SERVICE,
            message: response.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
        });
    }

    let markdown = response
        .data
        .and_then(|d| d.markdown)
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ServiceError::EmptyContent {
            service: SERVICE,
            url: url.to_string(),
        })?;

    Ok(ScrapedPage {
        url: url.to_string(),
        markdown,
    })
}

use super::WebSearch;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{SearchHit, TavilySearchRequest, TavilySearchResponse};
use async_trait::async_trait;
use tracing::debug;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Alternative search backend. Scraping always goes through Firecrawl.
#[derive(Debug, Clone)]
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: TAVILY_SEARCH_URL.to_string(),
        }
    }

    pub fn from_env() -> ServiceResult<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| ServiceError::MissingCredential("TAVILY_API_KEY"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, limit: usize) -> ServiceResult<Vec<SearchHit>> {
        let request = TavilySearchRequest {
            query: query.to_string(),
            max_results: limit,
            search_depth: "advanced".to_string(),
            include_raw_content: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                service: "tavily",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: "tavily",
                status: status.as_u16(),
                body,
            });
        }

        let search_response: TavilySearchResponse =
            response.json().await.map_err(|e| ServiceError::Decode {
                service: "tavily",
                message: e.to_string(),
            })?;

        let hits = normalize_results(search_response, limit);
        debug!("tavily returned {} hits for {:?}", hits.len(), query);
        Ok(hits)
    }
}

fn normalize_results(response: TavilySearchResponse, limit: usize) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .take(limit)
        .map(|r| SearchHit {
            url: r.url,
            title: Some(r.title),
            description: Some(r.content),
            markdown: r.raw_content.filter(|c| !c.trim().is_empty()),
        })
        .collect()
}

pub mod firecrawl;
pub mod llm;
pub mod tavily;

use crate::error::ServiceResult;
use crate::models::{ScrapedPage, SearchHit};
use async_trait::async_trait;

pub use firecrawl::FirecrawlClient;
pub use llm::{LanguageModel, ModelProvider, RigModel};
pub use tavily::TavilySearch;

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Ranked results for `query`, at most `limit` of them.
    async fn search(&self, query: &str, limit: usize) -> ServiceResult<Vec<SearchHit>>;
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> ServiceResult<ScrapedPage>;
}

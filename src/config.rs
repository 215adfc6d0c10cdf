//! Fixed research policy and service selection.

use crate::error::ServiceResult;
use crate::tasks::ResearchServices;
use crate::tools::llm::LlmSettings;
use crate::tools::{FirecrawlClient, RigModel, TavilySearch, WebSearch};
use std::sync::Arc;

/// Qualifier appended to the user query when looking for comparison articles.
pub const ARTICLE_QUERY_SUFFIX: &str = "tools comparison best alternatives";
pub const ARTICLE_SEARCH_LIMIT: usize = 5;
/// Characters kept from each scraped article.
pub const ARTICLE_CONTENT_BUDGET: usize = 1500;
pub const FALLBACK_SEARCH_LIMIT: usize = 5;
pub const MAX_TOOLS_TO_RESEARCH: usize = 4;
pub const ANALYSIS_DESCRIPTION_BUDGET: usize = 500;

pub const MAX_USER_TURN_CHARS: usize = 175_000;
pub const QUIT_SENTINEL: &str = "quit";

pub const DEFAULT_QUERY: &str = "database management tools";
pub const WORKFLOW_TEMPERATURE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SearchBackend {
    #[default]
    Firecrawl,
    Tavily,
}

/// Wires the production services from environment credentials.
pub fn services_from_env(llm: LlmSettings, backend: SearchBackend) -> ServiceResult<ResearchServices> {
    let firecrawl = Arc::new(FirecrawlClient::from_env()?);
    let search: Arc<dyn WebSearch> = match backend {
        SearchBackend::Firecrawl => firecrawl.clone(),
        SearchBackend::Tavily => Arc::new(TavilySearch::from_env()?),
    };

    Ok(ResearchServices {
        llm: Arc::new(RigModel::from_env(llm)?),
        search,
        scraper: firecrawl,
    })
}

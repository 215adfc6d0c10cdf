use super::analysis::analyze_company_content;
use super::{FailurePolicy, ResearchServices, ResearchStep};
use crate::config::{FALLBACK_SEARCH_LIMIT, MAX_TOOLS_TO_RESEARCH};
use crate::error::ServiceError;
use crate::models::{CompanyInfo, ResearchState, StateUpdate};
use async_trait::async_trait;
use graph_flow::NextAction;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum SkipReason {
    #[error("no official site found")]
    NotFound,
    #[error("site search failed: {0}")]
    Search(#[source] ServiceError),
    #[error("scrape failed: {0}")]
    Scrape(#[source] ServiceError),
}

/// Resolves each candidate tool to its site and analyzes the page.
pub struct CompanyResearchTask {
    services: ResearchServices,
}

impl CompanyResearchTask {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    async fn candidate_names(&self, state: &ResearchState) -> Vec<String> {
        if !state.extracted_tools.is_empty() {
            return state
                .extracted_tools
                .iter()
                .take(MAX_TOOLS_TO_RESEARCH)
                .cloned()
                .collect();
        }

        info!("No extracted tools found, falling back to direct search");
        match self
            .services
            .search
            .search(&state.query, FALLBACK_SEARCH_LIMIT)
            .await
        {
            Ok(hits) => hits
                .iter()
                .take(FALLBACK_SEARCH_LIMIT)
                .map(|hit| hit.display_title())
                .collect(),
            Err(e) => {
                warn!("Fallback search for {:?} failed: {}", state.query, e);
                vec![]
            }
        }
    }

    async fn research_tool(&self, tool_name: &str) -> Result<CompanyInfo, SkipReason> {
        let hits = self
            .services
            .search
            .search(&format!("{} official site", tool_name), 1)
            .await
            .map_err(SkipReason::Search)?;
        let site = hits.into_iter().next().ok_or(SkipReason::NotFound)?;

        let mut company = CompanyInfo::shell(tool_name, site.url.as_str(), site.summary());

        let page = self
            .services
            .scraper
            .scrape(&site.url)
            .await
            .map_err(SkipReason::Scrape)?;
        if page.markdown.trim().is_empty() {
            return Err(SkipReason::Scrape(ServiceError::EmptyContent {
                service: "scraper",
                url: site.url,
            }));
        }

        let analysis = analyze_company_content(self.services.llm.as_ref(), &company.name, &page.markdown).await;
        company.apply_analysis(analysis);
        Ok(company)
    }
}

#[async_trait]
impl ResearchStep for CompanyResearchTask {
    const ID: &'static str = "research";
    const POLICY: FailurePolicy = FailurePolicy::SkipAndContinue;
    const NEXT: NextAction = NextAction::ContinueAndExecute;

    async fn step(&self, state: &ResearchState) -> anyhow::Result<StateUpdate> {
        let tool_names = self.candidate_names(state).await;
        info!("Researching specific tools: {}", tool_names.join(", "));

        let mut companies = Vec::with_capacity(tool_names.len());
        for tool_name in &tool_names {
            match self.research_tool(tool_name).await {
                Ok(company) => {
                    info!("Researched {} at {}", company.name, company.website);
                    companies.push(company);
                }
                Err(reason) => warn!("Skipping {}: {}", tool_name, reason),
            }
        }

        info!("Researched {} of {} tools", companies.len(), tool_names.len());
        Ok(StateUpdate::companies(companies))
    }

    fn fallback(&self, _state: &ResearchState) -> StateUpdate {
        StateUpdate::companies(vec![])
    }
}

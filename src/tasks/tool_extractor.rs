use super::{FailurePolicy, ResearchServices, ResearchStep};
use crate::config::{ARTICLE_CONTENT_BUDGET, ARTICLE_QUERY_SUFFIX, ARTICLE_SEARCH_LIMIT};
use crate::models::{ChatMessage, ResearchState, StateUpdate};
use crate::prompts;
use crate::text::truncate_chars;
use async_trait::async_trait;
use graph_flow::NextAction;
use tracing::{info, warn};

/// Finds candidate tool names in comparison articles about the query.
pub struct ToolExtractionTask {
    services: ResearchServices,
}

impl ToolExtractionTask {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    async fn collect_article_content(&self, query: &str) -> anyhow::Result<String> {
        let articles_query = format!("{} {}", query, ARTICLE_QUERY_SUFFIX);
        let hits = self
            .services
            .search
            .search(&articles_query, ARTICLE_SEARCH_LIMIT)
            .await?;

        let mut all_content = String::new();
        for hit in hits.iter().take(ARTICLE_SEARCH_LIMIT) {
            match self.services.scraper.scrape(&hit.url).await {
                Ok(page) => {
                    all_content.push_str(truncate_chars(&page.markdown, ARTICLE_CONTENT_BUDGET));
                    all_content.push_str("\n\n");
                }
                Err(e) => warn!("Skipping article {}: {}", hit.url, e),
            }
        }
        Ok(all_content)
    }
}

#[async_trait]
impl ResearchStep for ToolExtractionTask {
    const ID: &'static str = "extract_tools";
    const POLICY: FailurePolicy = FailurePolicy::DegradeWithDefault;
    const NEXT: NextAction = NextAction::ContinueAndExecute;

    async fn step(&self, state: &ResearchState) -> anyhow::Result<StateUpdate> {
        info!("Finding articles about: {}", state.query);
        let all_content = self.collect_article_content(&state.query).await?;

        let messages = [
            ChatMessage::system(prompts::TOOL_EXTRACTION_SYSTEM),
            ChatMessage::user(prompts::tool_extraction_user(&state.query, &all_content)),
        ];
        let response = self.services.llm.complete(&messages).await?;

        let tool_names = parse_tool_names(&response);
        info!(
            "Extracted tools: {}",
            tool_names.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(StateUpdate::extracted_tools(tool_names))
    }

    fn fallback(&self, _state: &ResearchState) -> StateUpdate {
        StateUpdate::extracted_tools(vec![])
    }
}

/// One tool name per non-blank line.
pub fn parse_tool_names(response: &str) -> Vec<String> {
    response
        .trim()
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::tasks::execute_step;
    use crate::tasks::testing::{hit, FakeScraper, FakeSearch, ScriptedModel};
    use std::sync::Arc;

    const ARTICLES: &str = "database management tools tools comparison best alternatives";

    fn services(search: FakeSearch, scraper: FakeScraper, llm: ScriptedModel) -> (ResearchServices, Arc<ScriptedModel>) {
        let llm = Arc::new(llm);
        let services = ResearchServices {
            llm: llm.clone(),
            search: Arc::new(search),
            scraper: Arc::new(scraper),
        };
        (services, llm)
    }

    #[test]
    fn blank_lines_are_dropped() {
        let names = parse_tool_names("\n  Prisma \n\nDrizzle\n   \nTypeORM\n");
        assert_eq!(names, vec!["Prisma", "Drizzle", "TypeORM"]);
        assert!(parse_tool_names("   \n\n").is_empty());
    }

    #[tokio::test]
    async fn article_content_is_truncated_and_sent_to_the_model() {
        let long_article = "x".repeat(4000);
        let search = FakeSearch::default().with(
            ARTICLES,
            vec![hit("https://one.dev", "One"), hit("https://two.dev", "Two"), hit("https://gone.dev", "Gone")],
        );
        let scraper = FakeScraper::default()
            .with("https://one.dev", &long_article)
            .with("https://two.dev", "short article");
        let (services, llm) = services(search, scraper, ScriptedModel::new(vec![Ok("ToolA\nToolB\n".into())]));

        let task = ToolExtractionTask::new(services);
        let update = task.step(&ResearchState::new("database management tools")).await.unwrap();
        assert_eq!(update.extracted_tools, Some(vec!["ToolA".to_string(), "ToolB".to_string()]));

        let seen = llm.seen.lock().unwrap();
        let user_prompt = &seen[0][1].content;
        assert!(user_prompt.contains(&"x".repeat(1500)));
        assert!(!user_prompt.contains(&"x".repeat(1501)));
        assert!(user_prompt.contains("short article"));
    }

    #[tokio::test]
    async fn model_failure_degrades_to_empty_tool_list() {
        let search = FakeSearch::default().with(ARTICLES, vec![hit("https://one.dev", "One")]);
        let scraper = FakeScraper::default().with("https://one.dev", "article");
        let (services, _) = services(
            search,
            scraper,
            ScriptedModel::new(vec![Err(ServiceError::Model("rate limited".into()))]),
        );

        let task = ToolExtractionTask::new(services);
        let update = execute_step(&task, &ResearchState::new("database management tools"))
            .await
            .unwrap();
        assert_eq!(update.extracted_tools, Some(vec![]));
    }

    #[tokio::test]
    async fn search_failure_degrades_without_calling_the_model() {
        let search = FakeSearch::default().failing_on(ARTICLES);
        let (services, llm) = services(search, FakeScraper::default(), ScriptedModel::default());

        let task = ToolExtractionTask::new(services);
        let update = execute_step(&task, &ResearchState::new("database management tools"))
            .await
            .unwrap();
        assert_eq!(update.extracted_tools, Some(vec![]));
        assert!(llm.seen.lock().unwrap().is_empty());
    }
}

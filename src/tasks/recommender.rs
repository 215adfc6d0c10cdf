use super::{FailurePolicy, ResearchServices, ResearchStep};
use crate::models::{ChatMessage, ResearchState, StateUpdate};
use crate::prompts;
use async_trait::async_trait;
use graph_flow::NextAction;
use tracing::info;

/// Synthesizes the final recommendation from the researched companies.
pub struct RecommendationTask {
    services: ResearchServices,
}

impl RecommendationTask {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ResearchStep for RecommendationTask {
    const ID: &'static str = "analyze";
    const POLICY: FailurePolicy = FailurePolicy::FailFast;
    const NEXT: NextAction = NextAction::End;

    async fn step(&self, state: &ResearchState) -> anyhow::Result<StateUpdate> {
        info!("Generating recommendation from {} companies", state.companies.len());

        let company_data = state
            .companies
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let messages = [
            ChatMessage::system(prompts::RECOMMENDATION_SYSTEM),
            ChatMessage::user(prompts::recommendation_user(&state.query, &company_data)),
        ];
        let analysis = self.services.llm.complete(&messages).await?;

        info!("Generated recommendation with {} characters", analysis.len());
        Ok(StateUpdate::analysis(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::CompanyInfo;
    use crate::tasks::execute_step;
    use crate::tasks::testing::{FakeScraper, FakeSearch, ScriptedModel};
    use std::sync::Arc;

    fn task(llm: Arc<ScriptedModel>) -> RecommendationTask {
        RecommendationTask::new(ResearchServices {
            llm,
            search: Arc::new(FakeSearch::default()),
            scraper: Arc::new(FakeScraper::default()),
        })
    }

    #[tokio::test]
    async fn returns_model_text_verbatim() {
        let llm = Arc::new(ScriptedModel::new(vec![Ok("  Use Neon.\n".into())]));
        let mut state = ResearchState::new("database management tools");
        state.companies = vec![
            CompanyInfo::shell("Neon", "https://neon.tech", "Postgres"),
            CompanyInfo::shell("Supabase", "https://supabase.com", "Firebase alternative"),
        ];

        let update = task(llm.clone()).step(&state).await.unwrap();
        assert_eq!(update.analysis.as_deref(), Some("  Use Neon.\n"));

        let seen = llm.seen.lock().unwrap();
        let user_prompt = &seen[0][1].content;
        assert!(user_prompt.contains("Developer Query: database management tools"));
        assert!(user_prompt.contains(r#""name":"Neon""#));
        assert!(user_prompt.contains(r#"}, {"name":"Supabase""#));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let llm = Arc::new(ScriptedModel::new(vec![Err(ServiceError::Model("down".into()))]));
        let result = execute_step(&task(llm), &ResearchState::new("q")).await;
        assert!(result.is_err());
    }
}

mod analysis;
mod company_researcher;
mod recommender;
mod tool_extractor;

pub use analysis::{analyze_company_content, parse_company_analysis, AnalysisParseError};
pub use company_researcher::CompanyResearchTask;
pub use recommender::RecommendationTask;
pub use tool_extractor::{parse_tool_names, ToolExtractionTask};

use crate::models::{ResearchState, StateUpdate};
use crate::tools::{LanguageModel, PageScraper, WebSearch};
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub const STATE_KEY: &str = "research_state";
pub const TASK_TIMES_KEY: &str = "task_times";

/// External collaborators shared by every step.
#[derive(Clone)]
pub struct ResearchServices {
    pub llm: Arc<dyn LanguageModel>,
    pub search: Arc<dyn WebSearch>,
    pub scraper: Arc<dyn PageScraper>,
}

/// What a step does when its own work fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The error ends the run.
    FailFast,
    /// The error is logged and [`ResearchStep::fallback`] is merged instead.
    DegradeWithDefault,
    /// Items that fail are dropped inside the step; a step-level error
    /// degrades to the fallback.
    SkipAndContinue,
}

/// One node of the research graph.
#[async_trait]
pub trait ResearchStep: Send + Sync {
    const ID: &'static str;
    const POLICY: FailurePolicy;
    const NEXT: NextAction;

    async fn step(&self, state: &ResearchState) -> anyhow::Result<StateUpdate>;

    fn fallback(&self, _state: &ResearchState) -> StateUpdate {
        StateUpdate::default()
    }
}

/// Runs `step` and applies the step's declared [`FailurePolicy`].
pub async fn execute_step<S: ResearchStep>(
    step: &S,
    state: &ResearchState,
) -> anyhow::Result<StateUpdate> {
    match step.step(state).await {
        Ok(update) => Ok(update),
        Err(e) => match S::POLICY {
            FailurePolicy::FailFast => Err(e),
            FailurePolicy::DegradeWithDefault | FailurePolicy::SkipAndContinue => {
                error!("{} failed, continuing with defaults: {:#}", S::ID, e);
                Ok(step.fallback(state))
            }
        },
    }
}

/// Adapts a [`ResearchStep`] to a graph-flow task over the shared state.
pub struct StepTask<S>(pub S);

#[async_trait]
impl<S: ResearchStep + 'static> Task for StepTask<S> {
    fn id(&self) -> &str {
        S::ID
    }

    #[instrument(skip(self, context), fields(task = S::ID))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting {} task", S::ID);

        let mut state: ResearchState = context
            .get(STATE_KEY)
            .await
            .ok_or_else(|| GraphError::ContextError("Research state not found".to_string()))?;

        let update = execute_step(&self.0, &state).await.map_err(GraphError::Other)?;
        state.apply(update);
        context.set(STATE_KEY, state).await;

        let elapsed = start_time.elapsed().as_millis() as u64;
        let mut task_times: HashMap<String, u64> =
            context.get(TASK_TIMES_KEY).await.unwrap_or_default();
        task_times.insert(S::ID.to_string(), elapsed);
        context.set(TASK_TIMES_KEY, task_times).await;

        Ok(TaskResult::new(
            Some(format!("{} completed in {}ms", S::ID, elapsed)),
            S::NEXT,
        ))
    }
}

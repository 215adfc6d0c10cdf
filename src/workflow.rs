use crate::config::DEFAULT_QUERY;
use crate::models::{ResearchReport, ResearchState};
use crate::tasks::{
    CompanyResearchTask, RecommendationTask, ResearchServices, ResearchStep, StepTask,
    ToolExtractionTask, STATE_KEY, TASK_TIMES_KEY,
};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use graph_flow::{ExecutionStatus, FlowRunner, Graph, GraphBuilder, InMemorySessionStorage, Session, SessionStorage};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// `extract_tools` -> `research` -> `analyze`, no branches.
pub fn build_graph(services: ResearchServices) -> Graph {
    GraphBuilder::new("research_workflow")
        .add_task(Arc::new(StepTask(ToolExtractionTask::new(services.clone()))))
        .add_task(Arc::new(StepTask(CompanyResearchTask::new(services.clone()))))
        .add_task(Arc::new(StepTask(RecommendationTask::new(services))))
        .add_edge(ToolExtractionTask::ID, CompanyResearchTask::ID)
        .add_edge(CompanyResearchTask::ID, RecommendationTask::ID)
        .build()
}

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub session_id: String,
    pub state: ResearchState,
    pub started_at: DateTime<Utc>,
    pub total_time_ms: u64,
    pub task_times: HashMap<String, u64>,
}

impl From<ResearchOutcome> for ResearchReport {
    fn from(outcome: ResearchOutcome) -> Self {
        ResearchReport {
            session_id: outcome.session_id,
            query: outcome.state.query,
            extracted_tools: outcome.state.extracted_tools,
            companies: outcome.state.companies,
            analysis: outcome.state.analysis,
            started_at: outcome.started_at,
            total_time_ms: outcome.total_time_ms,
            task_times: outcome.task_times,
        }
    }
}

#[derive(Clone)]
pub struct ResearchWorkflow {
    runner: Arc<FlowRunner>,
    storage: Arc<dyn SessionStorage>,
}

impl ResearchWorkflow {
    pub fn new(services: ResearchServices) -> Self {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let graph = Arc::new(build_graph(services));
        let runner = Arc::new(FlowRunner::new(graph, storage.clone()));
        Self { runner, storage }
    }

    /// Runs every node once, in order, and returns the terminal state.
    #[instrument(skip(self))]
    pub async fn run(&self, query: &str) -> Result<ResearchOutcome> {
        let start_time = std::time::Instant::now();
        let started_at = Utc::now();
        let session_id = Uuid::new_v4().to_string();
        info!("Starting research workflow for session {}", session_id);

        let session = Session::new_from_task(session_id.clone(), ToolExtractionTask::ID);
        session.context.set(STATE_KEY, ResearchState::new(query)).await;
        self.storage.save(session).await?;

        loop {
            let result = self.runner.run(&session_id).await?;
            match &result.status {
                ExecutionStatus::Completed => {
                    info!("Workflow completed in {:?}", start_time.elapsed());
                    break;
                }
                ExecutionStatus::Paused { next_task_id, .. } => {
                    debug!("Workflow paused, next task: {}", next_task_id);
                    continue;
                }
                ExecutionStatus::Error(e) => bail!("Workflow error: {}", e),
                _ => bail!("Workflow stopped waiting for input"),
            }
        }

        let session = self
            .storage
            .get(&session_id)
            .await?
            .ok_or_else(|| anyhow!("Session {} disappeared", session_id))?;
        let state: ResearchState = session
            .context
            .get(STATE_KEY)
            .await
            .ok_or_else(|| anyhow!("Research state missing from session {}", session_id))?;
        let task_times = session.context.get(TASK_TIMES_KEY).await.unwrap_or_default();

        Ok(ResearchOutcome {
            session_id,
            state,
            started_at,
            total_time_ms: start_time.elapsed().as_millis() as u64,
            task_times,
        })
    }
}

/// Reads one query line, falling back to [`DEFAULT_QUERY`] on a blank line or EOF.
pub async fn read_query<R: AsyncBufRead + Unpin>(mut input: R) -> std::io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).await?;
    let query = line.trim();
    if query.is_empty() {
        Ok(DEFAULT_QUERY.to_string())
    } else {
        Ok(query.to_string())
    }
}

/// Human-readable summary of a finished run.
pub fn format_summary(state: &ResearchState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Results Summary:");
    let _ = writeln!(out, "  Query: {}", state.query);
    let _ = writeln!(out, "  Tools Found: {}", state.extracted_tools.len());
    let _ = writeln!(out, "  Companies Analyzed: {}", state.companies.len());

    if !state.extracted_tools.is_empty() {
        let _ = writeln!(out, "\nExtracted Tools:");
        for (i, tool) in state.extracted_tools.iter().take(5).enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, tool);
        }
    }

    if !state.companies.is_empty() {
        let _ = writeln!(out, "\nCompanies Analyzed:");
        for (i, company) in state.companies.iter().take(3).enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, company.name);
            let _ = writeln!(out, "     Website: {}", company.website);
            let _ = writeln!(
                out,
                "     Pricing: {}",
                company.pricing_model.as_deref().unwrap_or("Unknown")
            );
            let open_source = match company.is_open_source {
                Some(true) => "Yes",
                Some(false) => "No",
                None => "Unknown",
            };
            let _ = writeln!(out, "     Open Source: {}", open_source);
            if !company.tech_stack.is_empty() {
                let stack: Vec<&str> = company.tech_stack.iter().take(3).map(String::as_str).collect();
                let _ = writeln!(out, "     Tech Stack: {}", stack.join(", "));
            }
            let _ = writeln!(out);
        }
    }

    if let Some(analysis) = &state.analysis {
        let _ = writeln!(out, "Recommendation:");
        let _ = writeln!(out, "  {}", analysis);
    }
    out
}

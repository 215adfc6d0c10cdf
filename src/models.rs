use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shared state of one research run.
///
/// Created with only `query` set; every pipeline step hands back a
/// [`StateUpdate`] that is merged with [`ResearchState::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub query: String,
    pub extracted_tools: Vec<String>,
    pub companies: Vec<CompanyInfo>,
    pub analysis: Option<String>,
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Tool names and analysis are replaced, companies are appended.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(tools) = update.extracted_tools {
            self.extracted_tools = tools;
        }
        if let Some(companies) = update.companies {
            self.companies.extend(companies);
        }
        if let Some(analysis) = update.analysis {
            self.analysis = Some(analysis);
        }
    }
}

/// Partial view of [`ResearchState`] produced by a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub extracted_tools: Option<Vec<String>>,
    pub companies: Option<Vec<CompanyInfo>>,
    pub analysis: Option<String>,
}

impl StateUpdate {
    pub fn extracted_tools(tools: Vec<String>) -> Self {
        Self {
            extracted_tools: Some(tools),
            ..Default::default()
        }
    }

    pub fn companies(companies: Vec<CompanyInfo>) -> Self {
        Self {
            companies: Some(companies),
            ..Default::default()
        }
    }

    pub fn analysis(analysis: String) -> Self {
        Self {
            analysis: Some(analysis),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    pub description: String,
    pub website: String,
    pub tech_stack: Vec<String>,
    pub competitors: Vec<String>,
    pub pricing_model: Option<String>,
    pub is_open_source: Option<bool>,
    pub api_available: Option<bool>,
    pub language_support: Vec<String>,
    pub integration_capabilities: Vec<String>,
}

impl CompanyInfo {
    pub fn shell(name: impl Into<String>, website: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: website.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn apply_analysis(&mut self, analysis: CompanyAnalysis) {
        self.pricing_model = Some(analysis.pricing_model);
        self.is_open_source = analysis.is_open_source;
        self.tech_stack = analysis.tech_stack;
        if !analysis.description.is_empty() {
            self.description = analysis.description;
        }
        self.api_available = analysis.api_available;
        self.language_support = analysis.language_support;
        self.integration_capabilities = analysis.integration_capabilities;
    }
}

/// Structured assessment of one company's scraped page.
///
/// The JSON schema of this type is embedded in the analysis prompt, and the
/// model's answer must deserialize into it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompanyAnalysis {
    /// One of Free, Freemium, Paid, Enterprise or Unknown.
    pub pricing_model: String,
    /// `null` when the page does not say.
    pub is_open_source: Option<bool>,
    pub tech_stack: Vec<String>,
    /// One sentence focused on what the tool does for developers.
    pub description: String,
    /// `null` when the page does not say.
    pub api_available: Option<bool>,
    pub language_support: Vec<String>,
    pub integration_capabilities: Vec<String>,
}

impl CompanyAnalysis {
    pub fn unknown(description: impl Into<String>) -> Self {
        Self {
            pricing_model: "Unknown".to_string(),
            is_open_source: None,
            tech_stack: vec![],
            description: description.into(),
            api_available: None,
            language_support: vec![],
            integration_capabilities: vec![],
        }
    }
}

/// A search result, normalized at the service boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub markdown: Option<String>,
}

impl SearchHit {
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown")
            .to_string()
    }

    /// Best available description: scraped markdown first, then the snippet.
    pub fn summary(&self) -> String {
        self.markdown
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub session_id: String,
    pub query: String,
    pub extracted_tools: Vec<String>,
    pub companies: Vec<CompanyInfo>,
    pub analysis: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub total_time_ms: u64,
    pub task_times: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirecrawlSearchRequest {
    pub query: String,
    pub limit: usize,
    #[serde(rename = "scrapeOptions")]
    pub scrape_options: FirecrawlScrapeOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirecrawlScrapeOptions {
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirecrawlScrapeRequest {
    pub url: String,
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirecrawlSearchResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<FirecrawlDocument>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirecrawlScrapeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<FirecrawlDocument>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirecrawlDocument {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub metadata: Option<FirecrawlMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirecrawlMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "sourceURL")]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilySearchRequest {
    pub query: String,
    pub max_results: usize,
    pub search_depth: String,
    pub include_raw_content: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilySearchResponse {
    pub results: Vec<TavilyResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyResult {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub raw_content: Option<String>,
    pub score: f64,
}

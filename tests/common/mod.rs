#![allow(dead_code)]

use async_trait::async_trait;
use devtools_research::error::{ServiceError, ServiceResult};
use devtools_research::models::{ChatMessage, ScrapedPage, SearchHit};
use devtools_research::prompts;
use devtools_research::tools::{LanguageModel, PageScraper, WebSearch};
use devtools_research::ResearchServices;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const QUERY: &str = "database management tools";
pub const ARTICLES_QUERY: &str = "database management tools tools comparison best alternatives";

/// Answers by prompt kind so step order does not matter.
#[derive(Default)]
pub struct RoutedModel {
    pub extraction: Option<String>,
    pub analyses: Mutex<VecDeque<String>>,
    pub recommendation: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for RoutedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> ServiceResult<String> {
        let system = messages[0].content.as_str();
        let (kind, reply) = if system == prompts::TOOL_EXTRACTION_SYSTEM {
            ("extraction", self.extraction.clone())
        } else if system == prompts::TOOL_ANALYSIS_SYSTEM {
            ("analysis", self.analyses.lock().unwrap().pop_front())
        } else if system == prompts::RECOMMENDATION_SYSTEM {
            ("recommendation", self.recommendation.clone())
        } else {
            ("unknown", None)
        };
        self.calls.lock().unwrap().push(kind.to_string());
        reply.ok_or_else(|| ServiceError::Model(format!("{kind} unavailable")))
    }
}

#[derive(Default)]
pub struct MapSearch {
    pub results: HashMap<String, Vec<SearchHit>>,
}

impl MapSearch {
    pub fn with(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }
}

#[async_trait]
impl WebSearch for MapSearch {
    async fn search(&self, query: &str, limit: usize) -> ServiceResult<Vec<SearchHit>> {
        Ok(self
            .results
            .get(query)
            .map(|hits| hits.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MapScraper {
    pub pages: HashMap<String, String>,
}

impl MapScraper {
    pub fn with(mut self, url: &str, markdown: &str) -> Self {
        self.pages.insert(url.to_string(), markdown.to_string());
        self
    }
}

#[async_trait]
impl PageScraper for MapScraper {
    async fn scrape(&self, url: &str) -> ServiceResult<ScrapedPage> {
        match self.pages.get(url).filter(|m| !m.is_empty()) {
            Some(markdown) => Ok(ScrapedPage {
                url: url.to_string(),
                markdown: markdown.clone(),
            }),
            None => Err(ServiceError::EmptyContent {
                service: "map",
                url: url.to_string(),
            }),
        }
    }
}

pub fn hit(url: &str, title: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: Some(title.to_string()),
        description: Some(format!("{title} from search")),
        markdown: None,
    }
}

pub fn analysis_json(description: &str, open_source: bool) -> String {
    format!(
        "```json\n{{\"pricing_model\": \"Freemium\", \"is_open_source\": {open_source}, \"tech_stack\": [\"SQL\"], \"description\": \"{description}\", \"api_available\": true, \"language_support\": [\"Python\"], \"integration_capabilities\": [\"GitHub\"]}}\n```"
    )
}

/// Mock article corpus naming ToolA, ToolB and ToolC, each with a site.
pub fn corpus() -> (MapSearch, MapScraper) {
    let search = MapSearch::default()
        .with(
            ARTICLES_QUERY,
            vec![
                hit("https://blog.dev/best-db-tools", "Best DB tools"),
                hit("https://news.dev/db-alternatives", "DB alternatives"),
            ],
        )
        .with("ToolA official site", vec![hit("https://toola.dev", "ToolA")])
        .with("ToolB official site", vec![hit("https://toolb.dev", "ToolB")])
        .with("ToolC official site", vec![hit("https://toolc.dev", "ToolC")]);
    let scraper = MapScraper::default()
        .with("https://blog.dev/best-db-tools", "ToolA and ToolB lead the pack.")
        .with("https://news.dev/db-alternatives", "ToolC is a rising alternative.")
        .with("https://toola.dev", "# ToolA\nManaged SQL.")
        .with("https://toolb.dev", "# ToolB\nOpen source database GUI.")
        .with("https://toolc.dev", "# ToolC\nSchema migrations.");
    (search, scraper)
}

pub fn services(model: RoutedModel, search: MapSearch, scraper: MapScraper) -> (ResearchServices, Arc<RoutedModel>) {
    let model = Arc::new(model);
    let services = ResearchServices {
        llm: model.clone(),
        search: Arc::new(search),
        scraper: Arc::new(scraper),
    };
    (services, model)
}

pub fn full_model(recommendation: Option<&str>) -> RoutedModel {
    RoutedModel {
        extraction: Some("ToolA\nToolB\n\nToolC\n".to_string()),
        analyses: Mutex::new(
            vec![
                analysis_json("ToolA analysis", false),
                analysis_json("ToolB analysis", true),
                analysis_json("ToolC analysis", false),
            ]
            .into(),
        ),
        recommendation: recommendation.map(str::to_string),
        calls: Mutex::new(vec![]),
    }
}

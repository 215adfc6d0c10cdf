use crate::config::ANALYSIS_DESCRIPTION_BUDGET;
use crate::models::{ChatMessage, CompanyAnalysis};
use crate::prompts;
use crate::text::truncate_chars;
use crate::tools::LanguageModel;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AnalysisParseError {
    #[error("no JSON object in model response")]
    NoJsonObject,
    #[error("analysis does not match schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Asks the model for a structured assessment of one company's page.
///
/// Never fails: a model error yields an all-unknown analysis, and a response
/// that does not match the schema is logged and reduced to its leading text.
pub async fn analyze_company_content(
    llm: &dyn LanguageModel,
    company_name: &str,
    content: &str,
) -> CompanyAnalysis {
    let messages = [
        ChatMessage::system(prompts::TOOL_ANALYSIS_SYSTEM),
        ChatMessage::user(prompts::tool_analysis_user(company_name, content)),
    ];

    let response = match llm.complete(&messages).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Analysis of {} failed: {}", company_name, e);
            return CompanyAnalysis::unknown("");
        }
    };

    match parse_company_analysis(&response) {
        Ok(analysis) => analysis,
        Err(e) => {
            error!("Analysis of {} unusable: {}", company_name, e);
            CompanyAnalysis::unknown(truncate_chars(response.trim(), ANALYSIS_DESCRIPTION_BUDGET))
        }
    }
}

/// Strictly decodes a [`CompanyAnalysis`] from a model response.
///
/// The object may be bare or inside a Markdown code fence. Missing keys,
/// unknown keys and wrong types are all errors.
pub fn parse_company_analysis(response: &str) -> Result<CompanyAnalysis, AnalysisParseError> {
    let json = extract_json_object(response).ok_or(AnalysisParseError::NoJsonObject)?;
    Ok(serde_json::from_str(json)?)
}

fn extract_json_object(response: &str) -> Option<&str> {
    let body = match response.find("```") {
        Some(open) => {
            let after_fence = &response[open + 3..];
            let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
            let inner = &after_fence[content_start..];
            let close = inner.find("```").unwrap_or(inner.len());
            &inner[..close]
        }
        None => response,
    };

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

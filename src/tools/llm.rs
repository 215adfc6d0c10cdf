use crate::error::{ServiceError, ServiceResult};
use crate::models::{ChatMessage, Role};
use async_trait::async_trait;
use rig::completion::Chat;
use rig::message::Message;
use rig::prelude::*;
use rig::providers::openai;
use rig::tool::Tool;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub type LLMAgent = rig::agent::Agent<openai::CompletionModel>;

/// Ordered role-tagged messages in, one completion out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> ServiceResult<String>;
}

/// OpenAI-compatible endpoints the adapter knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelProvider {
    OpenRouter,
    Gemini,
    OpenAi,
}

impl ModelProvider {
    pub fn base_url(self) -> &'static str {
        match self {
            ModelProvider::OpenRouter => "https://openrouter.ai/api/v1",
            ModelProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            ModelProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            ModelProvider::OpenRouter => "OPENROUTER_API_KEY",
            ModelProvider::Gemini => "GEMINI_API_KEY",
            ModelProvider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::OpenRouter => "deepseek/deepseek-chat-v3-0324:free",
            ModelProvider::Gemini => "gemini-1.5-flash",
            ModelProvider::OpenAi => "gpt-4o-mini",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: ModelProvider,
    pub model: String,
    pub temperature: f64,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl LlmSettings {
    pub fn new(provider: ModelProvider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            temperature: 0.0,
            max_retries: 3,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

fn client_for(provider: ModelProvider) -> ServiceResult<openai::Client> {
    let var = provider.api_key_var();
    let api_key = std::env::var(var).map_err(|_| ServiceError::MissingCredential(var))?;
    Ok(openai::Client::from_url(&api_key, provider.base_url()))
}

/// [`LanguageModel`] backed by rig's OpenAI-compatible completion client.
pub struct RigModel {
    client: openai::Client,
    settings: LlmSettings,
}

impl RigModel {
    pub fn from_env(settings: LlmSettings) -> ServiceResult<Self> {
        Ok(Self {
            client: client_for(settings.provider)?,
            settings,
        })
    }
}

#[async_trait]
impl LanguageModel for RigModel {
    async fn complete(&self, messages: &[ChatMessage]) -> ServiceResult<String> {
        let (preamble, history, prompt) = split_conversation(messages)?;

        let mut builder = self
            .client
            .agent(&self.settings.model)
            .temperature(self.settings.temperature);
        if !preamble.is_empty() {
            builder = builder.preamble(&preamble);
        }
        let agent = builder.build();

        with_retries(&self.settings, || {
            let prompt = prompt.clone();
            let history = history.clone();
            let agent = &agent;
            async move {
                agent
                    .chat(Message::user(prompt), history)
                    .await
                    .map_err(|e| ServiceError::Model(e.to_string()))
            }
        })
        .await
    }
}

/// Runs `call` under the configured request timeout, retrying failed or
/// timed-out attempts with exponential backoff up to `max_retries` times.
pub async fn with_retries<T, F, Fut>(settings: &LlmSettings, mut call: F) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let mut attempt = 0;
    loop {
        let error = match tokio::time::timeout(settings.request_timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => ServiceError::Timeout(settings.request_timeout),
        };

        if attempt >= settings.max_retries {
            return Err(error);
        }
        let delay = backoff(attempt);
        attempt += 1;
        warn!("model call failed ({}), retry {} in {:?}", error, attempt, delay);
        tokio::time::sleep(delay).await;
    }
}

fn backoff(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(1 << attempt.min(4));
    Duration::from_millis(millis)
}

/// System messages form the preamble, the last user message is the prompt,
/// everything between is replayed as history.
fn split_conversation(messages: &[ChatMessage]) -> ServiceResult<(String, Vec<Message>, String)> {
    let last_user = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .ok_or_else(|| ServiceError::Model("conversation has no user message".to_string()))?;

    let preamble = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let history = messages[..last_user]
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(Message::user(m.content.clone())),
            Role::Assistant => Some(Message::assistant(m.content.clone())),
            Role::System => None,
        })
        .collect();

    Ok((preamble, history, messages[last_user].content.clone()))
}

/// Agent that can call `tools` while answering.
pub fn build_tool_agent<T: Tool + 'static>(
    settings: &LlmSettings,
    preamble: &str,
    tools: Vec<T>,
) -> ServiceResult<LLMAgent> {
    let client = client_for(settings.provider)?;
    let mut builder = client
        .agent(&settings.model)
        .preamble(preamble)
        .temperature(settings.temperature);
    for tool in tools {
        builder = builder.tool(tool);
    }
    Ok(builder.build())
}

/// Converts our conversation into rig history plus the pending prompt.
pub fn to_rig_conversation(messages: &[ChatMessage]) -> ServiceResult<(Vec<Message>, String)> {
    let (_, history, prompt) = split_conversation(messages)?;
    Ok((history, prompt))
}

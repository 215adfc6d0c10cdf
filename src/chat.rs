use crate::config::{MAX_USER_TURN_CHARS, QUIT_SENTINEL};
use crate::mcp::{McpClient, McpServerConfig, McpToolAdapter};
use crate::models::ChatMessage;
use crate::text::truncate_chars;
use crate::error::ServiceError;
use crate::tools::llm::{build_tool_agent, to_rig_conversation, with_retries, LLMAgent, LlmSettings};
use anyhow::Result;
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::message::Message;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that can scrape websites, crawl pages, and extract data using Firecrawl tools. Think step by step and use the appropriate tools to help the user.";

/// Upper bound on model/tool round trips within one user turn.
const MAX_TOOL_TURNS: usize = 8;

/// Answers the latest user turn of a conversation, calling tools as needed.
#[async_trait]
pub trait ToolAgent: Send + Sync {
    async fn respond(&self, history: &[ChatMessage]) -> Result<String>;
}

pub struct RigToolAgent {
    agent: LLMAgent,
    settings: LlmSettings,
}

impl RigToolAgent {
    pub fn new(agent: LLMAgent, settings: LlmSettings) -> Self {
        Self { agent, settings }
    }
}

#[async_trait]
impl ToolAgent for RigToolAgent {
    /// Each attempt replays the turn from the same history, so a timed-out
    /// attempt leaves no partial tool exchange behind.
    async fn respond(&self, history: &[ChatMessage]) -> Result<String> {
        let (rig_history, prompt) = to_rig_conversation(history)?;
        let reply = with_retries(&self.settings, || {
            let mut rig_history = rig_history.clone();
            let prompt = prompt.clone();
            let agent = &self.agent;
            async move {
                agent
                    .prompt(Message::user(prompt))
                    .with_history(&mut rig_history)
                    .multi_turn(MAX_TOOL_TURNS)
                    .await
                    .map_err(|e| ServiceError::Model(e.to_string()))
            }
        })
        .await?;
        Ok(reply)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    Quit,
    Reply(String),
    Failed(String),
}

/// Conversation state of one REPL session.
pub struct ChatSession<A> {
    agent: A,
    history: Vec<ChatMessage>,
}

impl<A: ToolAgent> ChatSession<A> {
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// A failed turn leaves the user message in history and adds no reply.
    pub async fn handle_line(&mut self, line: &str) -> Turn {
        if line == QUIT_SENTINEL {
            return Turn::Quit;
        }

        self.history
            .push(ChatMessage::user(truncate_chars(line, MAX_USER_TURN_CHARS)));

        match self.agent.respond(&self.history).await {
            Ok(reply) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                Turn::Reply(reply)
            }
            Err(e) => {
                error!("Agent turn failed: {:#}", e);
                Turn::Failed(format!("{:#}", e))
            }
        }
    }
}

/// Reads lines from `input` until `quit` or EOF, writing replies to `output`.
pub async fn run_repl<A, R, W>(
    session: &mut ChatSession<A>,
    tool_names: &[String],
    mut input: R,
    mut output: W,
) -> Result<()>
where
    A: ToolAgent,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("Available tools - {}\n{}\n", tool_names.join(" "), "-".repeat(60)).as_bytes())
        .await?;

    loop {
        output.write_all(b"\nYou: ").await?;
        output.flush().await?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.strip_suffix('\n').unwrap_or(&line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        match session.handle_line(line).await {
            Turn::Quit => {
                output.write_all(b"Exiting...\n").await?;
                break;
            }
            Turn::Reply(reply) => {
                output.write_all(format!("\nAgent: {}\n", reply).as_bytes()).await?;
            }
            Turn::Failed(e) => {
                output.write_all(format!("Error: {}\n", e).as_bytes()).await?;
            }
        }
    }
    output.flush().await?;
    Ok(())
}

/// Launches the tool server, builds the agent and runs the REPL on stdio.
pub async fn run_chat(settings: LlmSettings, server: McpServerConfig) -> Result<()> {
    let client = Arc::new(McpClient::spawn(&server).await?);
    let tools = McpToolAdapter::discover(client.clone()).await?;
    let tool_names: Vec<String> = tools.iter().map(|t| t.descriptor().name.clone()).collect();
    info!("Discovered {} tools", tool_names.len());

    let agent = RigToolAgent::new(build_tool_agent(&settings, SYSTEM_PROMPT, tools)?, settings);
    let mut session = ChatSession::new(agent);

    let result = run_repl(
        &mut session,
        &tool_names,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await;

    client.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use std::sync::Mutex;

    /// Echoes the last user message, failing when it contains "fail".
    #[derive(Default)]
    struct EchoAgent {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ToolAgent for EchoAgent {
        async fn respond(&self, history: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(history.len());
            let last = &history.last().unwrap().content;
            if last.contains("fail") {
                anyhow::bail!("provider unavailable");
            }
            Ok(format!("echo: {}", last))
        }
    }

    /// Accepts connections and never answers them.
    async fn silent_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn stalled_provider_fails_the_turn_not_the_session() {
        use rig::prelude::*;
        use rig::providers::openai;
        use std::time::Duration;

        let settings = LlmSettings {
            max_retries: 1,
            request_timeout: Duration::from_millis(200),
            ..LlmSettings::new(crate::tools::ModelProvider::OpenAi)
        };
        let agent = openai::Client::from_url("test-key", &silent_endpoint().await)
            .agent(&settings.model)
            .build();
        let mut session = ChatSession::new(RigToolAgent::new(agent, settings));

        let turn = tokio::time::timeout(Duration::from_secs(5), session.handle_line("scrape neon.tech"))
            .await
            .expect("turn should end once the request timeout is hit");
        match turn {
            Turn::Failed(e) => assert!(e.contains("timed out"), "unexpected error: {e}"),
            other => panic!("expected a failed turn, got {other:?}"),
        }
        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[tokio::test]
    async fn quit_is_exact() {
        let mut session = ChatSession::new(EchoAgent::default());
        assert_eq!(session.handle_line("quit").await, Turn::Quit);
        assert_eq!(session.handle_line("QUIT").await, Turn::Reply("echo: QUIT".into()));
        assert_eq!(session.handle_line("quit ").await, Turn::Reply("echo: quit ".into()));
        assert_eq!(session.handle_line("").await, Turn::Reply("echo: ".into()));
    }

    #[tokio::test]
    async fn long_turns_are_truncated() {
        let mut session = ChatSession::new(EchoAgent::default());
        session.handle_line(&"é".repeat(MAX_USER_TURN_CHARS + 10)).await;
        let user = &session.history()[1];
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content.chars().count(), MAX_USER_TURN_CHARS);
    }

    #[tokio::test]
    async fn failed_turn_keeps_user_message_only() {
        let mut session = ChatSession::new(EchoAgent::default());
        session.handle_line("hello").await;
        let turn = session.handle_line("please fail").await;
        assert_eq!(turn, Turn::Failed("provider unavailable".into()));

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);

        assert_eq!(session.handle_line("still here").await, Turn::Reply("echo: still here".into()));
        assert_eq!(session.history().len(), 6);
    }

    #[tokio::test]
    async fn repl_runs_until_quit() {
        let mut session = ChatSession::new(EchoAgent::default());
        let input: &[u8] = b"scrape neon.tech\r\nplease fail\n\nquit\nnever read\n";
        let mut output = Vec::new();

        run_repl(&mut session, &["firecrawl_scrape".into()], input, &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Available tools - firecrawl_scrape\n"));
        assert!(output.contains(&"-".repeat(60)));
        assert!(output.contains("Agent: echo: scrape neon.tech\n"));
        assert!(output.contains("Error: provider unavailable\n"));
        assert!(output.ends_with("Exiting...\n"));
        assert!(!output.contains("never read"));
        assert_eq!(session.agent.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn repl_stops_at_eof() {
        let mut session = ChatSession::new(EchoAgent::default());
        let input: &[u8] = b"hi";
        let mut output = Vec::new();
        run_repl(&mut session, &[], input, &mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Agent: echo: hi"));
        assert!(!output.contains("Exiting"));
    }
}

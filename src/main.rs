use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use devtools_research::chat::run_chat;
use devtools_research::config::{services_from_env, SearchBackend, DEFAULT_QUERY, WORKFLOW_TEMPERATURE};
use devtools_research::mcp::McpServerConfig;
use devtools_research::server::{self, AppState};
use devtools_research::tools::llm::{LlmSettings, ModelProvider};
use devtools_research::{format_summary, read_query, ResearchWorkflow};
use std::io::Write;
use tokio::io::BufReader;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devtools-research", version, about = "Developer tools research agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research a developer-tools query and print a recommendation
    Research(ResearchArgs),
    /// Serve the research workflow over HTTP
    Serve(ServeArgs),
    /// Chat with an agent that can use Firecrawl tools
    Chat(ChatArgs),
}

#[derive(Args)]
struct ModelArgs {
    /// Model provider
    #[arg(long, env = "LLM_PROVIDER", value_enum, default_value = "open-router")]
    provider: ModelProvider,

    /// Model identifier, defaults to the provider's default model
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,
}

#[derive(Args)]
struct ResearchArgs {
    /// Query to research; asked for on stdin when omitted
    query: Option<String>,

    #[command(flatten)]
    model: ModelArgs,

    #[arg(long, env = "SEARCH_BACKEND", value_enum, default_value = "firecrawl")]
    search_backend: SearchBackend,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,

    #[command(flatten)]
    model: ModelArgs,

    #[arg(long, env = "SEARCH_BACKEND", value_enum, default_value = "firecrawl")]
    search_backend: SearchBackend,
}

#[derive(Args)]
struct ChatArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Command that starts the MCP tool server
    #[arg(long, default_value = "npx")]
    server_command: String,

    /// Arguments for the tool server command
    #[arg(long, num_args = 1.., allow_hyphen_values = true, default_values = ["-y", "firecrawl-mcp"])]
    server_args: Vec<String>,
}

fn workflow_settings(model: ModelArgs) -> LlmSettings {
    LlmSettings::new(model.provider)
        .with_model(model.model)
        .with_temperature(WORKFLOW_TEMPERATURE)
}

async fn prompt_for_query() -> Result<String> {
    println!("Enter a query to research (or press Enter for '{}'):", DEFAULT_QUERY);
    print!("Query: ");
    std::io::stdout().flush()?;

    let query = read_query(BufReader::new(tokio::io::stdin())).await?;
    if query == DEFAULT_QUERY {
        println!("Using default query: {}", DEFAULT_QUERY);
    }
    Ok(query)
}

async fn research(args: ResearchArgs) -> Result<()> {
    let services = services_from_env(workflow_settings(args.model), args.search_backend)?;
    let workflow = ResearchWorkflow::new(services);

    let query = match args.query {
        Some(query) if !query.trim().is_empty() => query.trim().to_string(),
        _ => prompt_for_query().await?,
    };

    println!("\nStarting research for: '{}'", query);
    match workflow.run(&query).await {
        Ok(outcome) => {
            println!("\nResearch completed!\n{}", "=".repeat(50));
            print!("{}", format_summary(&outcome.state));
            Ok(())
        }
        Err(e) => {
            error!("Research failed: {:#}", e);
            println!("\nError during research: {:#}", e);
            println!("Please check your API keys and internet connection.");
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devtools_research=info,graph_flow=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Research(args) => research(args).await,
        Command::Serve(args) => {
            let settings = workflow_settings(args.model);
            let services = services_from_env(settings, args.search_backend)?;
            let state = AppState {
                workflow: ResearchWorkflow::new(services),
            };
            server::serve(state, &args.addr).await
        }
        Command::Chat(args) => {
            let settings = LlmSettings::new(args.model.provider).with_model(args.model.model);
            let mut server = McpServerConfig::firecrawl_from_env();
            server.command = args.server_command;
            server.args = args.server_args;
            run_chat(settings, server).await
        }
    }
}

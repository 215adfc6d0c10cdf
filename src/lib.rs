//! Developer-tools research agents: a three-step research workflow
//! (extract tool names, research each company, recommend) and an interactive
//! chat agent whose tools come from an MCP server.

pub mod chat;
pub mod config;
pub mod error;
pub mod mcp;
pub mod models;
pub mod prompts;
pub mod server;
pub mod tasks;
pub mod text;
pub mod tools;
pub mod workflow;

pub use models::{CompanyAnalysis, CompanyInfo, ResearchState};
pub use tasks::ResearchServices;
pub use workflow::{format_summary, read_query, ResearchOutcome, ResearchWorkflow};

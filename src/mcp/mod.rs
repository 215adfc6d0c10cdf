//! Tool-subprocess channel: a JSON-RPC client for MCP servers over stdio and
//! the adapter that hands their tools to the chat agent.

mod client;
pub mod protocol;
mod tool;

pub use client::{McpClient, McpError, McpServerConfig};
pub use protocol::ToolDescriptor;
pub use tool::McpToolAdapter;

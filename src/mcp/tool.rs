use super::client::{McpClient, McpError};
use super::protocol::ToolDescriptor;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// One server-side tool exposed to the agent under its own name.
#[derive(Clone)]
pub struct McpToolAdapter {
    client: Arc<McpClient>,
    descriptor: ToolDescriptor,
}

impl McpToolAdapter {
    pub fn new(client: Arc<McpClient>, descriptor: ToolDescriptor) -> Self {
        Self { client, descriptor }
    }

    /// Adapters for every tool the server advertises.
    pub async fn discover(client: Arc<McpClient>) -> Result<Vec<Self>, McpError> {
        let tools = client.list_tools().await?;
        Ok(tools
            .into_iter()
            .map(|descriptor| Self::new(client.clone(), descriptor))
            .collect())
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

impl Tool for McpToolAdapter {
    const NAME: &'static str = "mcp_tool";

    type Error = McpError;
    type Args = Value;
    type Output = String;

    fn name(&self) -> String {
        self.descriptor.name.clone()
    }

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: self.descriptor.name.clone(),
            description: self.descriptor.description.clone().unwrap_or_default(),
            parameters: self.descriptor.input_schema.clone(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        info!("Calling tool {}", self.descriptor.name);
        let client = self.client.clone();
        let name = self.descriptor.name.clone();
        let result = tokio::spawn(async move { client.call_tool(&name, args).await })
            .await
            .map_err(|e| McpError::Task(e.to_string()))??;

        let text = result.text();
        if result.is_error {
            Ok(format!("Tool error: {}", text))
        } else {
            Ok(text)
        }
    }
}

use super::messages::{
    assistant_message_from_response, ContentBlock, MessageParam, MessageRequest,
    MessageResponse, ResponseContentBlock, ToolDefinitionApi,
};
use super::tools::{get_all_tools, ToolDefinition};
use super::{EngineError, EngineNotifier, ReasoningEngine};
use crate::backend::BackendClient;
use crate::config::ConfigError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Optional JSON settings file for the bundled engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub api_url: String,
    pub max_tokens: u32,
    pub max_turns: usize,
    pub system: Option<String>,
    /// Tool allow-list; every tool is offered when absent.
    pub tools: Option<Vec<String>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            max_tokens: 4096,
            max_turns: 16,
            system: None,
            tools: None,
        }
    }
}

impl EngineSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadEngineSettings {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::ParseEngineSettings {
            path: path.to_path_buf(),
            source,
        })
    }

    fn allows(&self, tool: &str) -> bool {
        self.tools
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|name| name == tool))
    }
}

/// Tool-use loop against the Anthropic Messages API.
pub struct Agent {
    client: Client,
    api_key: String,
    model: String,
    settings: EngineSettings,
    tools: Vec<ToolDefinition>,
    backend: BackendClient,
}

impl Agent {
    pub fn new(
        api_key: String,
        model: String,
        settings: EngineSettings,
        backend: BackendClient,
    ) -> Self {
        let tools = get_all_tools()
            .into_iter()
            .filter(|tool| settings.allows(tool.name))
            .collect();
        Self {
            client: Client::new(),
            api_key,
            model,
            settings,
            tools,
            backend,
        }
    }

    async fn run_inference(
        &self,
        conversation: &[MessageParam],
    ) -> Result<MessageResponse, EngineError> {
        let tools_api: Vec<ToolDefinitionApi> = self
            .tools
            .iter()
            .map(|t| ToolDefinitionApi {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema.clone(),
            })
            .collect();

        let request = MessageRequest {
            model: &self.model,
            max_tokens: self.settings.max_tokens,
            system: self.settings.system.as_deref(),
            messages: conversation,
            tools: tools_api,
        };

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(EngineError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    /// Runs a tool; the bool is true when the tool failed.
    async fn execute_tool(&self, name: &str, input: serde_json::Value) -> (String, bool) {
        let Some(tool) = self.tools.iter().find(|t| t.name == name) else {
            return (format!("tool not found: {}", name), true);
        };

        match (tool.handler)(self.backend.clone(), input).await {
            Ok(result) => (result, false),
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "tool failed");
                (err.to_string(), true)
            }
        }
    }
}

#[async_trait]
impl ReasoningEngine for Agent {
    async fn invoke(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        notifier: EngineNotifier,
    ) -> Result<String, EngineError> {
        let mut conversation = vec![MessageParam::user_text(prompt)];

        for turn in 0..self.settings.max_turns {
            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                response = self.run_inference(&conversation) => response?,
            };
            tracing::debug!(turn, stop_reason = ?response.stop_reason, "model turn finished");

            let mut answer = String::new();
            let mut tool_results = Vec::new();

            for content in &response.content {
                match content {
                    ResponseContentBlock::Text { text } => {
                        notifier.token(text.as_str()).await;
                        answer.push_str(text);
                    }
                    ResponseContentBlock::ToolUse { id, name, input } => {
                        if cancel.is_cancelled() {
                            return Err(EngineError::Cancelled);
                        }
                        notifier.tool_call(name.as_str(), input.to_string()).await;

                        let (result, failed) = self.execute_tool(name, input.clone()).await;
                        notifier.tool_result(name.as_str(), result.as_str(), failed).await;
                        tool_results.push(ContentBlock::tool_result(id.clone(), result, failed));
                    }
                    ResponseContentBlock::Unsupported => {}
                }
            }

            conversation.push(assistant_message_from_response(&response));
            if tool_results.is_empty() {
                if answer.is_empty() && response.stop_reason.as_deref() == Some("max_tokens") {
                    return Err(EngineError::Other(
                        "model hit max_tokens before answering".to_string(),
                    ));
                }
                return Ok(answer);
            }
            conversation.push(MessageParam::User {
                content: tool_results,
            });
        }

        Err(EngineError::TurnLimit(self.settings.max_turns))
    }
}

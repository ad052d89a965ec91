//! Anthropic Messages API wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct MessageRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system: Option<&'a str>,
    pub(crate) messages: &'a [MessageParam],
    pub(crate) tools: Vec<ToolDefinitionApi>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub(crate) enum MessageParam {
    User { content: Vec<ContentBlock> },
    Assistant { content: Vec<ContentBlock> },
}

impl MessageParam {
    pub(crate) fn user_text(text: &str) -> Self {
        MessageParam::User {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    pub(crate) fn tool_result(tool_use_id: String, content: String, is_error: bool) -> Self {
        Self::ToolResult {
            tool_use_id,
            content,
            is_error: if is_error { Some(true) } else { None },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub(crate) content: Vec<ResponseContentBlock>,
    #[serde(default)]
    pub(crate) stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Thinking and other blocks this gateway does not relay.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolDefinitionApi {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) input_schema: serde_json::Value,
}

pub(crate) fn assistant_message_from_response(response: &MessageResponse) -> MessageParam {
    let content = response
        .content
        .iter()
        .filter_map(|content| match content {
            ResponseContentBlock::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
            ResponseContentBlock::ToolUse { id, name, input } => Some(ContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            ResponseContentBlock::Unsupported => None,
        })
        .collect();

    MessageParam::Assistant { content }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(
        default,
        rename = "slide_base64",
        alias = "auxiliaryPayload",
        skip_serializing_if = "Option::is_none"
    )]
    pub auxiliary_payload: Option<String>,
    #[serde(
        default,
        rename = "x",
        alias = "routingFlag",
        skip_serializing_if = "Option::is_none"
    )]
    pub routing_flag: Option<i64>,
}

impl ChatRequest {
    /// The auxiliary payload, if the request carries a non-empty one.
    pub fn auxiliary_payload(&self) -> Option<&str> {
        self.auxiliary_payload
            .as_deref()
            .filter(|payload| !payload.is_empty())
    }

    /// The task pane sends `null` before a routing mode is picked.
    pub fn routing_flag(&self) -> i64 {
        self.routing_flag.unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SideChannelPayload<'a> {
    #[serde(rename = "slideBase64")]
    pub slide_base64: &'a str,
}

/// One message on the `/chat` event stream.
///
/// Field names follow what the browser task pane reads off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    Start {
        prompt: String,
    },
    ToolCall {
        #[serde(rename = "tool")]
        name: String,
        #[serde(rename = "args")]
        args_text: String,
    },
    ToolResult {
        #[serde(rename = "tool")]
        name: String,
        #[serde(rename = "result")]
        result_text: String,
        #[serde(rename = "success")]
        succeeded: bool,
    },
    Token {
        #[serde(rename = "content")]
        text: String,
    },
    Done {
        #[serde(rename = "response")]
        final_answer: String,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl StreamEvent {
    /// `Done` and `Error` close a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_event_uses_task_pane_field_names() {
        let event = StreamEvent::ToolResult {
            name: "search".to_string(),
            result_text: "3 hits".to_string(),
            succeeded: true,
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "tool-result", "tool": "search", "result": "3 hits", "success": true})
        );

        let event = StreamEvent::ToolCall {
            name: "search".to_string(),
            args_text: "q=hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "tool-call", "tool": "search", "args": "q=hello"})
        );
    }

    #[test]
    fn chat_request_accepts_wire_and_descriptive_names() {
        let request: ChatRequest =
            serde_json::from_value(json!({"prompt": "hi", "slide_base64": "AAA=", "x": 1}))
                .unwrap();
        assert_eq!(request.auxiliary_payload(), Some("AAA="));
        assert_eq!(request.routing_flag(), 1);

        let request: ChatRequest = serde_json::from_value(
            json!({"prompt": "hi", "auxiliaryPayload": "BBB=", "routingFlag": 2}),
        )
        .unwrap();
        assert_eq!(request.auxiliary_payload(), Some("BBB="));
        assert_eq!(request.routing_flag(), 2);
    }

    #[test]
    fn chat_request_defaults_optional_fields() {
        let request: ChatRequest = serde_json::from_value(json!({"prompt": "hi"})).unwrap();
        assert_eq!(request.auxiliary_payload(), None);
        assert_eq!(request.routing_flag(), 0);

        let request: ChatRequest =
            serde_json::from_value(json!({"prompt": "hi", "slide_base64": "", "x": null}))
                .unwrap();
        assert_eq!(request.auxiliary_payload(), None);
        assert_eq!(request.routing_flag(), 0);
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Done { final_answer: String::new() }.is_terminal());
        assert!(StreamEvent::Error { message: String::new() }.is_terminal());
        assert!(!StreamEvent::Token { text: String::new() }.is_terminal());
    }
}

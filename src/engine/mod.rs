//! The reasoning engine seam.
//!
//! An engine turns a prompt into a final answer and reports its progress
//! through an [`EngineNotifier`]. Notifications are pushed over a bounded
//! channel that a single consumer drains in send order.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub mod agent;
mod messages;
#[cfg(test)]
pub(crate) mod scripted;
mod tools;

pub use agent::{Agent, EngineSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ToolCall {
        name: String,
        args: String,
    },
    ToolResult {
        name: String,
        result: String,
        failed: bool,
    },
    Token(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request cancelled")]
    Cancelled,
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API error: {status} - {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no final answer after {0} turns")]
    TurnLimit(usize),
    #[error("{0}")]
    Other(String),
}

/// Shared across every request; each call to [`ReasoningEngine::invoke`] is
/// independent.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Runs the prompt to completion.
    ///
    /// Implementations should return [`EngineError::Cancelled`] soon after
    /// `cancel` fires.
    async fn invoke(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        notifier: EngineNotifier,
    ) -> Result<String, EngineError>;
}

#[derive(Clone)]
pub struct EngineNotifier {
    events: mpsc::Sender<EngineEvent>,
}

impl EngineNotifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, receiver) = mpsc::channel(capacity);
        (Self { events }, receiver)
    }

    pub async fn tool_call(&self, name: impl Into<String>, args: impl Into<String>) {
        self.send(EngineEvent::ToolCall {
            name: name.into(),
            args: args.into(),
        })
        .await;
    }

    pub async fn tool_result(
        &self,
        name: impl Into<String>,
        result: impl Into<String>,
        failed: bool,
    ) {
        self.send(EngineEvent::ToolResult {
            name: name.into(),
            result: result.into(),
            failed,
        })
        .await;
    }

    pub async fn token(&self, text: impl Into<String>) {
        self.send(EngineEvent::Token(text.into())).await;
    }

    pub(crate) async fn send(&self, event: EngineEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("notification dropped, relay is gone");
        }
    }
}

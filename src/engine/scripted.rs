use super::{EngineError, EngineEvent, EngineNotifier, ReasoningEngine};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Replays a fixed sequence of notifications, then answers or fails.
pub(crate) struct ScriptedEngine {
    events: Vec<EngineEvent>,
    outcome: Result<String, String>,
    hold_until_cancelled: bool,
    saw_cancel: CancellationToken,
}

impl ScriptedEngine {
    pub(crate) fn answering(events: Vec<EngineEvent>, answer: &str) -> Self {
        Self {
            events,
            outcome: Ok(answer.to_string()),
            hold_until_cancelled: false,
            saw_cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn failing(events: Vec<EngineEvent>, message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            ..Self::answering(events, "")
        }
    }

    /// Sends its events, then blocks until the relay cancels it.
    pub(crate) fn stalling(events: Vec<EngineEvent>) -> Self {
        Self {
            hold_until_cancelled: true,
            ..Self::answering(events, "")
        }
    }

    /// Fires once the engine has observed its cancellation token.
    pub(crate) fn saw_cancel(&self) -> CancellationToken {
        self.saw_cancel.clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn invoke(
        &self,
        _prompt: &str,
        cancel: CancellationToken,
        notifier: EngineNotifier,
    ) -> Result<String, EngineError> {
        for event in &self.events {
            notifier.send(event.clone()).await;
        }

        if self.hold_until_cancelled {
            cancel.cancelled().await;
            self.saw_cancel.cancel();
            return Err(EngineError::Cancelled);
        }

        self.outcome.clone().map_err(EngineError::Other)
    }
}

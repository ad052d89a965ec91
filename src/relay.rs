//! `POST /chat`: validates the request, pushes the optional side-channel
//! payload, then relays one engine invocation onto an event stream.

use crate::engine::{EngineEvent, EngineError, EngineNotifier, ReasoningEngine};
use crate::error::GatewayError;
use crate::protocol::{ChatRequest, SideChannelPayload, StreamEvent};
use crate::server::ServerState;
use crate::session::{Emit, SessionOptions, SessionState, StreamSession};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use tracing::Instrument;

const NOTIFICATION_BUFFER: usize = 64;

impl From<EngineEvent> for StreamEvent {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::ToolCall { name, args } => StreamEvent::ToolCall {
                name,
                args_text: args,
            },
            EngineEvent::ToolResult {
                name,
                result,
                failed,
            } => StreamEvent::ToolResult {
                name,
                result_text: result,
                succeeded: !failed,
            },
            EngineEvent::Token(text) => StreamEvent::Token { text },
        }
    }
}

#[tracing::instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    // Validate before committing to a stream so failures stay plain HTTP errors.
    let request = parse_request(&body).inspect_err(|err| {
        tracing::info!(error = %err, "rejected chat request");
    })?;

    forward_side_channel(&state, &request).await;

    let (session, response) = StreamSession::open(SessionOptions {
        streaming_enabled: state.config.streaming,
    })
    .inspect_err(|err| tracing::error!(error = %err, "cannot open event stream"))?;

    let engine = Arc::clone(&state.engine);
    tokio::spawn(relay(session, engine, request.prompt).in_current_span());

    Ok(response)
}

fn parse_request(body: &[u8]) -> Result<ChatRequest, GatewayError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(GatewayError::InvalidBody)?;
    if request.prompt.is_empty() {
        return Err(GatewayError::EmptyPrompt);
    }
    Ok(request)
}

/// Best effort: a failed push is logged and the chat goes ahead.
async fn forward_side_channel(state: &ServerState, request: &ChatRequest) {
    let Some(payload) = request.auxiliary_payload() else {
        return;
    };
    if request.routing_flag() != state.config.side_channel_route {
        return;
    }

    let path = state.config.side_channel_path.as_str();
    let result = state
        .backend
        .post_json(path, &SideChannelPayload { slide_base64: payload })
        .await
        .and_then(|response| response.error_for_status(state.backend.url(path)));

    match result {
        Ok(_) => tracing::debug!(path, bytes = payload.len(), "forwarded side-channel payload"),
        Err(err) => tracing::warn!(path, error = %err, "side-channel delivery failed, continuing"),
    }
}

/// Drives one engine invocation and writes its events to `session`.
///
/// Emits `start`, every notification in arrival order, then exactly one of
/// `done` or `error`. A disconnect cancels the engine through the session's
/// token; the invocation is still polled to completion so it can unwind.
pub(crate) async fn relay(
    mut session: StreamSession,
    engine: Arc<dyn ReasoningEngine>,
    prompt: String,
) {
    let start = StreamEvent::Start {
        prompt: prompt.clone(),
    };
    if !deliver(&mut session, start).await {
        tracing::debug!("client left before the stream started");
        return;
    }

    let cancel = session.cancellation().child_token();
    let (notifier, mut notifications) = EngineNotifier::channel(NOTIFICATION_BUFFER);
    let invocation = engine.invoke(&prompt, cancel, notifier);
    tokio::pin!(invocation);

    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = notifications.recv() => {
                deliver(&mut session, event.into()).await;
            }
            outcome = &mut invocation => break outcome,
        }
    };

    // Notifications sent just before the invocation returned.
    while let Ok(event) = notifications.try_recv() {
        deliver(&mut session, event.into()).await;
    }

    if session.state() == SessionState::Broken {
        tracing::info!(ok = outcome.is_ok(), "client gone, discarding engine outcome");
        return;
    }

    let terminal = match outcome {
        Ok(final_answer) => {
            tracing::info!(answer_len = final_answer.len(), "chat finished");
            StreamEvent::Done { final_answer }
        }
        Err(EngineError::Cancelled) => {
            tracing::info!("chat cancelled");
            StreamEvent::Error {
                message: EngineError::Cancelled.to_string(),
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "reasoning engine failed");
            StreamEvent::Error {
                message: err.to_string(),
            }
        }
    };
    deliver(&mut session, terminal).await;
}

/// Emits one event; false once the client is gone.
async fn deliver(session: &mut StreamSession, event: StreamEvent) -> bool {
    let terminal = event.is_terminal();
    match session.emit(event).await {
        Ok(Emit::Delivered) => true,
        Ok(Emit::Suppressed) => false,
        Err(err) => {
            tracing::error!(error = %err, "event could not be encoded");
            if terminal {
                let fallback = StreamEvent::Error {
                    message: err.to_string(),
                };
                return matches!(session.emit(fallback).await, Ok(Emit::Delivered));
            }
            true
        }
    }
}

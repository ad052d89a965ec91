//! Presentation tools the engine can call. Each one is a thin wrapper over a
//! backend endpoint.

use crate::backend::{BackendClient, BackendResponse};
use std::future::Future;
use std::pin::Pin;

mod align_shapes;
mod list_slides;
mod slide_shapes;

pub(crate) type ToolError = Box<dyn std::error::Error + Send + Sync>;

type ToolFuture = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>;

type ToolHandler = fn(BackendClient, serde_json::Value) -> ToolFuture;

pub(crate) struct ToolDefinition {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) input_schema: serde_json::Value,
    pub(crate) handler: ToolHandler,
}

pub(crate) fn get_all_tools() -> Vec<ToolDefinition> {
    vec![
        align_shapes::definition(),
        list_slides::definition(),
        slide_shapes::definition(),
    ]
}

/// The backend's JSON answer as tool output, or an error for non-2xx.
fn response_text(
    backend: &BackendClient,
    path: &str,
    response: BackendResponse,
) -> Result<String, ToolError> {
    let response = response.error_for_status(backend.url(path))?;
    Ok(String::from_utf8_lossy(&response.body).into_owned())
}

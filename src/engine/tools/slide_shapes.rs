use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use super::{response_text, ToolDefinition, ToolError};
use crate::backend::BackendClient;

#[derive(Debug, Deserialize, JsonSchema)]
struct SlideShapesInput {
    #[schemars(description = "The slide id, as returned by list_slides.")]
    slide_id: String,
}

async fn slide_shapes_impl(
    backend: BackendClient,
    input: serde_json::Value,
) -> Result<String, ToolError> {
    let input: SlideShapesInput = serde_json::from_value(input)?;
    let slide_id = input.slide_id.trim();
    if slide_id.is_empty() || slide_id.contains(['/', '?', '#']) {
        return Err(format!("invalid slide id: {:?}", input.slide_id).into());
    }

    let path = format!("/slide/{}/shapes", slide_id);
    let response = backend.get(&path).await?;
    response_text(&backend, &path, response)
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "get_slide_shapes",
        description: "Describe every shape on a slide: its kind, text and position (left, top, width, height). Use this before moving or aligning shapes.",
        input_schema: schema_for!(SlideShapesInput).to_value(),
        handler: |backend, input| Box::pin(slide_shapes_impl(backend, input)),
    }
}

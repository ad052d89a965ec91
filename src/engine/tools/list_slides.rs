use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use super::{response_text, ToolDefinition, ToolError};
use crate::backend::BackendClient;

const PATH: &str = "/slides";

#[derive(Debug, Deserialize, JsonSchema)]
struct ListSlidesInput {}

async fn list_slides_impl(
    backend: BackendClient,
    input: serde_json::Value,
) -> Result<String, ToolError> {
    // models sometimes send null for a tool without parameters
    if !input.is_null() {
        let _: ListSlidesInput = serde_json::from_value(input)?;
    }
    let response = backend.get(PATH).await?;
    response_text(&backend, PATH, response)
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "list_slides",
        description: "List the ids of every slide in the open presentation, in order. Slide numbers used by other tools are 1-based positions in this list.",
        input_schema: schema_for!(ListSlidesInput).to_value(),
        handler: |backend, input| Box::pin(list_slides_impl(backend, input)),
    }
}

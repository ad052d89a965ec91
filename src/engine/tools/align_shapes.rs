use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::{response_text, ToolDefinition, ToolError};
use crate::backend::BackendClient;

const PATH: &str = "/slides/align_shapes_to_reference";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum ShapeKind {
    Title,
    Subtitle,
    /// Text box in the bottom 15% of the slide.
    Footnote,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct AlignShapesInput {
    #[schemars(description = "Slide number to copy shape positions from (1-based).")]
    reference_slide_number: u32,
    #[schemars(description = "Slide numbers to apply the positions to (1-based).")]
    target_slide_numbers: Vec<u32>,
    #[schemars(description = "Shape kinds to align.")]
    shapes_to_align: Vec<ShapeKind>,
}

impl AlignShapesInput {
    fn validate(&self) -> Result<(), ToolError> {
        if self.reference_slide_number == 0 || self.target_slide_numbers.contains(&0) {
            return Err("slide numbers are 1-based".into());
        }
        if self.target_slide_numbers.is_empty() {
            return Err("target_slide_numbers must not be empty".into());
        }
        if self.shapes_to_align.is_empty() {
            return Err("shapes_to_align must not be empty".into());
        }
        Ok(())
    }
}

async fn align_shapes_impl(
    backend: BackendClient,
    input: serde_json::Value,
) -> Result<String, ToolError> {
    let input: AlignShapesInput = serde_json::from_value(input)?;
    input.validate()?;

    let response = backend.post_json(PATH, &input).await?;
    response_text(&backend, PATH, response)
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "align_shapes_to_reference_slide",
        description: "Copy the position (left, top, width, height) of title, subtitle and/or footnote shapes from a reference slide onto other slides. Use when the user wants consistent layout, e.g. \"make all titles match slide 2\". Slide numbers are 1-based.",
        input_schema: schema_for!(AlignShapesInput).to_value(),
        handler: |backend, input| Box::pin(align_shapes_impl(backend, input)),
    }
}

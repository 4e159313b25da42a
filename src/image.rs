//! Still-image generation on Gemini's image model.

use serde_json::{json, Value};

use crate::error::GenerationError;
use crate::gemini::{Content, GeminiClient};
use crate::generation::{validate_prompt, GenerationResult};
use crate::media::DataUri;

/// Aspect ratios the image model accepts.
pub const ASPECT_RATIOS: &[&str] = &["1:1", "16:9", "9:16", "4:3", "3:4"];

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

#[derive(Debug, Clone)]
pub struct ImageGenerator {
    gemini: GeminiClient,
    model: String,
}

impl ImageGenerator {
    pub fn new(gemini: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            gemini,
            model: model.into(),
        }
    }

    /// Generate one image and return it as a `data:` URI.
    pub async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GenerationResult, GenerationError> {
        validate_prompt(prompt)?;
        if !ASPECT_RATIOS.contains(&aspect_ratio) {
            return Err(GenerationError::InvalidInput(format!(
                "Unsupported aspect ratio '{}' (expected one of {})",
                aspect_ratio,
                ASPECT_RATIOS.join(", ")
            )));
        }

        let body = json!({
            "contents": [Content::user(prompt.trim())],
            "generationConfig": {
                "imageConfig": { "aspectRatio": aspect_ratio },
            },
        });

        log::info!("Generating {} image", aspect_ratio);
        let response = self.gemini.generate_content(&self.model, body).await?;
        let uri = first_inline_image(&response)
            .ok_or_else(|| GenerationError::Unknown("No image generated".to_string()))?;
        GenerationResult::media_url(uri)
    }
}

/// First `inlineData` part of the first candidate, as a data URI.
fn first_inline_image(response: &Value) -> Option<String> {
    response
        .pointer("/candidates/0/content/parts")?
        .as_array()?
        .iter()
        .find_map(|part| {
            let inline = part.get("inlineData")?;
            let data = inline.get("data")?.as_str().filter(|d| !d.is_empty())?;
            let mime = inline
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(format!("data:{};base64,{}", mime, data))
        })
}

/// Decode a generated image for writing to disk.
pub fn decode_image(result: &GenerationResult) -> Result<DataUri, GenerationError> {
    DataUri::parse(result.payload())
}

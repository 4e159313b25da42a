//! qwen script writer: OpenRouter first, Gemini once if that comes back empty.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Submission, VideoProvider};
use crate::credentials::{Credentials, Service};
use crate::error::GenerationError;
use crate::gemini::{candidate_text, Content, GeminiClient};
use crate::generation::{validate_prompt, Engine, GenerationRequest, GenerationResult};
use crate::poller::PollPolicy;
use crate::transport::{HttpTransport, RequestDescriptor};

/// Text returned when both backends produce nothing.
pub const SCRIPT_UNAVAILABLE: &str = "Script generation unavailable.";

/// Attribution headers OpenRouter asks clients to send.
const REFERER: &str = "https://ai-hub.io";
const APP_TITLE: &str = "AI Hub";

/// Strategy that writes a text script instead of rendering video.
#[derive(Debug)]
pub struct ScriptProvider {
    transport: HttpTransport,
    credentials: Credentials,
    openrouter_url: String,
    primary_model: String,
    gemini: GeminiClient,
    secondary_model: String,
}

impl ScriptProvider {
    pub fn new(
        transport: HttpTransport,
        credentials: Credentials,
        openrouter_url: impl Into<String>,
        primary_model: impl Into<String>,
        gemini: GeminiClient,
        secondary_model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            openrouter_url: openrouter_url.into(),
            primary_model: primary_model.into(),
            gemini,
            secondary_model: secondary_model.into(),
        }
    }

    /// Ask OpenRouter for a script. Empty content comes back as `Ok("")`.
    async fn primary(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.openrouter_url.trim_end_matches('/'));
        let key = self.credentials.get_key(Service::Openrouter);
        let body = json!({
            "model": self.primary_model,
            "messages": [{
                "role": "user",
                "content": format!("Write a cinematic script for: {}", prompt),
            }],
        });

        let response = self
            .transport
            .send(
                RequestDescriptor::post(url)
                    .bearer(&key)
                    .header("HTTP-Referer", REFERER)
                    .header("X-Title", APP_TITLE)
                    .json(body),
            )
            .await?;

        Ok(response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    async fn secondary(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [Content::user(format!(
                "Write a highly detailed cinematic director's script for a video with this prompt: \"{}\". Describe camera angles and lighting.",
                prompt
            ))],
        });
        let response = self.gemini.generate_content(&self.secondary_model, body).await?;
        Ok(candidate_text(&response).trim().to_string())
    }

    /// Primary, then at most one hop to the secondary backend.
    pub async fn write_script(&self, prompt: &str) -> Result<String, GenerationError> {
        validate_prompt(prompt)?;
        let prompt = prompt.trim();

        match self.primary(prompt).await {
            Ok(script) if !script.is_empty() => return Ok(script),
            Ok(_) => log::warn!("OpenRouter returned an empty script, falling back to Gemini"),
            Err(e) => log::warn!("OpenRouter script request failed ({}), falling back to Gemini", e),
        }

        let script = self.secondary(prompt).await?;
        if script.is_empty() {
            log::warn!("Gemini returned an empty script");
            return Ok(SCRIPT_UNAVAILABLE.to_string());
        }
        Ok(script)
    }
}

#[async_trait]
impl VideoProvider for ScriptProvider {
    fn engine(&self) -> Engine {
        Engine::Qwen
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(std::time::Duration::ZERO, 1)
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let script = self.write_script(&request.prompt).await?;
        Ok(Submission::Ready(GenerationResult::text(script)?))
    }
}

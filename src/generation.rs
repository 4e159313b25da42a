//! Request, job and result types passed between the dispatcher and providers.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Video generation backend selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    Grok,
    ImagineArt,
    Veo,
    Qwen,
    Kling,
    Stock,
    WanVideo,
}

impl Engine {
    /// All engines, in the order they are offered to users.
    pub const ALL: [Engine; 7] = [
        Engine::Grok,
        Engine::ImagineArt,
        Engine::Veo,
        Engine::Qwen,
        Engine::Kling,
        Engine::Stock,
        Engine::WanVideo,
    ];

    /// Identifier used on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Grok => "grok",
            Engine::ImagineArt => "imagine-art",
            Engine::Veo => "veo",
            Engine::Qwen => "qwen",
            Engine::Kling => "kling",
            Engine::Stock => "stock",
            Engine::WanVideo => "wan-video",
        }
    }

    /// Whether the engine cannot run without a reference image.
    pub fn requires_image(&self) -> bool {
        matches!(self, Engine::WanVideo | Engine::Kling | Engine::ImagineArt)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Engine::ALL
            .iter()
            .copied()
            .find(|engine| engine.as_str() == s)
            .ok_or_else(|| GenerationError::InvalidInput(format!("Unknown engine '{}'", s)))
    }
}

/// A single user-initiated generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub engine: Engine,
    pub prompt: String,
    /// Reference image as a `data:` URI.
    pub reference_image: Option<String>,
}

impl GenerationRequest {
    pub fn new(engine: Engine, prompt: impl Into<String>, reference_image: Option<String>) -> Self {
        Self {
            engine,
            prompt: prompt.into(),
            reference_image,
        }
    }

    /// The prompt, or `fallback` when the user left it blank.
    pub fn prompt_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let trimmed = self.prompt.trim();
        if trimmed.is_empty() {
            fallback
        } else {
            trimmed
        }
    }

    /// The reference image, failing fast when the engine needs one.
    pub fn require_image(&self) -> Result<&str, GenerationError> {
        match self.reference_image.as_deref() {
            Some(image) if !image.trim().is_empty() => Ok(image),
            _ => Err(GenerationError::InvalidInput(format!(
                "{} requires a reference image",
                self.engine
            ))),
        }
    }
}

/// Reject empty or whitespace-only prompts.
pub fn validate_prompt(prompt: &str) -> Result<(), GenerationError> {
    if prompt.trim().is_empty() {
        return Err(GenerationError::InvalidInput("Prompt is empty".to_string()));
    }
    Ok(())
}

/// Reference to a job running at a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub provider: Engine,
    pub external_id: String,
    pub created_at: SystemTime,
}

impl JobHandle {
    pub fn new(provider: Engine, external_id: impl Into<String>) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
            created_at: SystemTime::now(),
        }
    }
}

/// How the caller should treat a result payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// Remote or `data:` URL of the media.
    MediaUrl,
    /// `file://` URL of media downloaded to the local blob store.
    BlobUrl,
    /// Plain text, e.g. a generated script.
    Text,
}

/// Successful outcome of a generation. The payload is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    kind: ResultKind,
    payload: String,
}

impl GenerationResult {
    pub fn new(kind: ResultKind, payload: impl Into<String>) -> Result<Self, GenerationError> {
        let payload = payload.into();
        if payload.trim().is_empty() {
            return Err(GenerationError::Unknown(
                "Provider returned an empty result".to_string(),
            ));
        }
        Ok(Self { kind, payload })
    }

    pub fn media_url(url: impl Into<String>) -> Result<Self, GenerationError> {
        Self::new(ResultKind::MediaUrl, url)
    }

    pub fn blob_url(url: impl Into<String>) -> Result<Self, GenerationError> {
        Self::new(ResultKind::BlobUrl, url)
    }

    pub fn text(text: impl Into<String>) -> Result<Self, GenerationError> {
        Self::new(ResultKind::Text, text)
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

//! Shared plumbing for the Gemini generative language API.

use serde::Serialize;
use serde_json::Value;

use crate::credentials::{Credentials, Service};
use crate::error::GenerationError;
use crate::generation::ChatTurn;
use crate::transport::{HttpTransport, RequestDescriptor};

/// Header carrying the Gemini key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// One `contents[]` entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Part {
    pub text: String,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }

    /// Content without a role, as used for `systemInstruction`.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn from_turn(turn: &ChatTurn) -> Self {
        Self {
            role: Some(turn.role.as_str().to_string()),
            parts: vec![Part {
                text: turn.text.clone(),
            }],
        }
    }
}

/// Thin client over `models/<model>:<method>` endpoints.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    transport: HttpTransport,
    credentials: Credentials,
    base_url: String,
}

impl GeminiClient {
    pub fn new(transport: HttpTransport, credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.into(),
        }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn api_key(&self) -> String {
        self.credentials.get_key(Service::Gemini)
    }

    /// `<base>/<path>` with duplicate slashes removed.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `<base>/models/<model>:<method>`.
    pub fn model_url(&self, model: &str, method: &str) -> String {
        self.url(&format!("models/{}:{}", model, method))
    }

    /// Descriptor with the key header already attached.
    pub fn post(&self, url: String, body: Value) -> RequestDescriptor {
        RequestDescriptor::post(url)
            .header(API_KEY_HEADER, self.api_key())
            .json(body)
    }

    pub fn get(&self, url: String) -> RequestDescriptor {
        RequestDescriptor::get(url).header(API_KEY_HEADER, self.api_key())
    }

    /// Call `generateContent` and return the raw response.
    pub async fn generate_content(&self, model: &str, body: Value) -> Result<Value, GenerationError> {
        log::debug!("Gemini generateContent on {}", model);
        self.transport
            .send(self.post(self.model_url(model, "generateContent"), body))
            .await
    }
}

/// Concatenated text of the first candidate's parts.
pub fn candidate_text(response: &Value) -> String {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

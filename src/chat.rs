//! Streaming assistant chat over Gemini server-sent events.

use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

use crate::error::GenerationError;
use crate::gemini::{Content, GeminiClient};
use crate::generation::{validate_prompt, ChatTurn};

const SYSTEM_INSTRUCTION: &str = "You are an AI Hub assistant. Be helpful, concise, and professional.";

/// Text fragments in arrival order. Ends when the upstream closes.
pub type ChatStream = BoxStream<'static, Result<String, GenerationError>>;

/// Splits an SSE byte stream into `data:` payloads.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes and return the payload of every completed `data:` line.
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(data) = data_payload(&line) {
                events.push(data);
            }
        }
        events
    }

    /// Payload of a trailing line that had no newline.
    fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim().strip_prefix("data:")?.trim();
    (!data.is_empty()).then(|| data.to_string())
}

/// Non-empty text parts of one streamed response chunk.
fn fragments(data: &str) -> Vec<String> {
    let event: Value = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            log::debug!("Skipping non-JSON SSE event: {}", e);
            return Vec::new();
        }
    };

    event
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

struct StreamState {
    upstream: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

fn decode_stream(upstream: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>) -> ChatStream {
    let state = StreamState {
        upstream,
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    for data in state.decoder.push(&chunk) {
                        state.ready.extend(fragments(&data));
                    }
                }
                Some(Err(e)) => {
                    log::error!("Chat stream read failed: {}", e);
                    state.done = true;
                    let error = GenerationError::unavailable(format!("Chat stream interrupted: {}", e));
                    return Some((Err(error), state));
                }
                None => {
                    state.done = true;
                    if let Some(data) = state.decoder.finish() {
                        state.ready.extend(fragments(&data));
                    }
                }
            }
        }
    })
    .boxed()
}

/// Gemini chat client with a fixed assistant persona.
#[derive(Debug, Clone)]
pub struct ChatClient {
    gemini: GeminiClient,
    model: String,
}

impl ChatClient {
    pub fn new(gemini: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            gemini,
            model: model.into(),
        }
    }

    fn request_body(message: &str, history: &[ChatTurn]) -> Value {
        let mut contents: Vec<Content> = history.iter().map(Content::from_turn).collect();
        contents.push(Content::user(message));
        json!({
            "systemInstruction": Content::system(SYSTEM_INSTRUCTION),
            "contents": contents,
        })
    }

    /// Open a streamed reply to `message` given the prior turns.
    pub async fn chat_stream(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<ChatStream, GenerationError> {
        validate_prompt(message)?;

        let descriptor = self
            .gemini
            .post(
                self.gemini.model_url(&self.model, "streamGenerateContent"),
                Self::request_body(message, history),
            )
            .query("alt", "sse");

        log::debug!("Opening chat stream on {} with {} prior turns", self.model, history.len());
        let response = self.gemini.transport().open_stream(descriptor).await?;
        let upstream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(decode_stream(upstream))
    }

    /// Drain a stream into the full reply.
    pub async fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<String, GenerationError> {
        let mut stream = self.chat_stream(message, history).await?;
        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment?);
        }
        Ok(reply)
    }
}

//! Veo long-running operation: submit, poll the operation, download into the blob store.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Submission, VideoProvider};
use crate::error::GenerationError;
use crate::gemini::{GeminiClient, API_KEY_HEADER};
use crate::generation::{Engine, GenerationRequest, GenerationResult, JobHandle};
use crate::media::{require_first_present, BlobStore, DataUri};
use crate::poller::{PollPolicy, PollStatus};
use crate::transport::provider_message;

const DEFAULT_PROMPT: &str = "Cinematic movement";

const VIDEO_URI_POINTERS: &[&str] = &[
    "/response/generateVideoResponse/generatedSamples/0/video/uri",
    "/response/generatedVideos/0/video/uri",
];

pub struct VeoProvider {
    gemini: GeminiClient,
    model: String,
    blobs: BlobStore,
    policy: PollPolicy,
}

impl std::fmt::Debug for VeoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeoProvider")
            .field("model", &self.model)
            .field("blobs", &self.blobs)
            .finish_non_exhaustive()
    }
}

impl VeoProvider {
    pub fn new(gemini: GeminiClient, model: impl Into<String>, blobs: BlobStore, policy: PollPolicy) -> Self {
        Self {
            gemini,
            model: model.into(),
            blobs,
            policy,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let mut instance = json!({ "prompt": request.prompt_or(DEFAULT_PROMPT) });

        if let Some(image) = request.reference_image.as_deref().filter(|i| !i.trim().is_empty()) {
            let image = DataUri::parse(image)?;
            instance["image"] = json!({
                "bytesBase64Encoded": image.base64_payload(),
                "mimeType": image.mime,
            });
        }

        Ok(json!({
            "instances": [instance],
            "parameters": {
                "aspectRatio": "16:9",
                "resolution": "720p",
                "sampleCount": 1,
            },
        }))
    }
}

#[async_trait]
impl VideoProvider for VeoProvider {
    fn engine(&self) -> Engine {
        Engine::Veo
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let body = self.build_body(request)?;
        let url = self.gemini.model_url(&self.model, "predictLongRunning");

        let operation = self
            .gemini
            .transport()
            .send(self.gemini.post(url, body))
            .await?;

        let name = operation
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| GenerationError::Unknown("Veo returned no operation name".to_string()))?;

        log::info!("Veo operation started: {}", name);
        Ok(Submission::Job(JobHandle::new(Engine::Veo, name)))
    }

    async fn check_status(&self, handle: &JobHandle) -> Result<PollStatus<Value>, GenerationError> {
        let operation = self
            .gemini
            .transport()
            .send(self.gemini.get(self.gemini.url(&handle.external_id)))
            .await?;

        if operation.get("error").is_some_and(|e| !e.is_null()) {
            return Ok(PollStatus::Failed(
                provider_message(&operation).unwrap_or_else(|| "Veo operation failed".to_string()),
            ));
        }

        if operation.get("done").and_then(Value::as_bool).unwrap_or(false) {
            Ok(PollStatus::Done(operation))
        } else {
            log::debug!("Veo operation {} still running", handle.external_id);
            Ok(PollStatus::Pending)
        }
    }

    async fn extract_result(
        &self,
        handle: &JobHandle,
        completed: Value,
    ) -> Result<GenerationResult, GenerationError> {
        let uri = require_first_present(&completed, VIDEO_URI_POINTERS, "Video URI")?;

        log::info!("Downloading Veo video for {}", handle.external_id);
        let headers = [(API_KEY_HEADER.to_string(), self.gemini.api_key())];
        let bytes = self.gemini.transport().fetch_bytes(&uri, &headers).await?;
        if bytes.is_empty() {
            return Err(GenerationError::Unknown("Veo video download was empty".to_string()));
        }

        let url = self.blobs.store(&handle.external_id, "mp4", &bytes).await?;
        GenerationResult::blob_url(url)
    }
}

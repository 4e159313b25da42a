//! fal.ai queue strategy for grok (text-to-video) and wan-video (image-to-video).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{unsuccessful_status, Submission, VideoProvider};
use crate::credentials::{Credentials, Service};
use crate::error::GenerationError;
use crate::generation::{validate_prompt, Engine, GenerationRequest, GenerationResult, JobHandle};
use crate::media::require_first_present;
use crate::poller::{PollPolicy, PollStatus};
use crate::transport::{provider_message, HttpTransport, RequestDescriptor};

/// Grok clip length in seconds.
const GROK_DURATION_SECS: u32 = 6;

/// Frames requested from wan-video.
const WAN_NUM_FRAMES: u32 = 81;

/// Aspect ratio requested from wan-video.
const WAN_ASPECT_RATIO: &str = "16:9";

/// Motion prompt used when the user only supplies an image.
const WAN_DEFAULT_PROMPT: &str = "Cinematic masterpiece, hyper-realistic motion.";

/// Where a completed job may carry the video URL, in priority order.
const RESULT_URL_POINTERS: &[&str] = &["/response/video/url", "/response/url", "/video/url"];

/// Which model on the fal.ai queue a provider talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FalVariant {
    /// xAI Grok Imagine, text only.
    Grok,
    /// Wan Video 2.1, needs a reference image.
    WanVideo,
}

impl FalVariant {
    fn engine(&self) -> Engine {
        match self {
            FalVariant::Grok => Engine::Grok,
            FalVariant::WanVideo => Engine::WanVideo,
        }
    }
}

/// Request body for queue submission.
#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_frames: Option<u32>,
}

/// Response from queue submission.
#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    /// The unique request ID for polling.
    pub request_id: String,
    /// URL to check status (optional).
    #[serde(default)]
    pub status_url: Option<String>,
}

/// Strategy for models served through the fal.ai request queue.
pub struct FalQueueProvider {
    variant: FalVariant,
    transport: HttpTransport,
    credentials: Credentials,
    base_url: String,
    model: String,
    policy: PollPolicy,
}

impl std::fmt::Debug for FalQueueProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalQueueProvider")
            .field("variant", &self.variant)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl FalQueueProvider {
    pub fn new(
        variant: FalVariant,
        transport: HttpTransport,
        credentials: Credentials,
        base_url: impl Into<String>,
        model: impl Into<String>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            variant,
            transport,
            credentials,
            base_url: base_url.into(),
            model: model.into(),
            policy,
        }
    }

    /// Queue endpoint for the model.
    pub fn submit_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.model)
    }

    /// Request endpoint for one job.
    pub fn request_url(&self, request_id: &str) -> String {
        format!("{}/requests/{}", self.submit_url(), request_id)
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.credentials.get_key(Service::Fal))
    }

    fn build_body(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let body = match self.variant {
            FalVariant::Grok => {
                validate_prompt(&request.prompt)?;
                SubmitRequest {
                    image_url: None,
                    prompt: request.prompt.trim(),
                    aspect_ratio: None,
                    duration: Some(GROK_DURATION_SECS),
                    num_frames: None,
                }
            }
            FalVariant::WanVideo => SubmitRequest {
                image_url: Some(request.require_image()?),
                prompt: request.prompt_or(WAN_DEFAULT_PROMPT),
                aspect_ratio: Some(WAN_ASPECT_RATIO),
                duration: None,
                num_frames: Some(WAN_NUM_FRAMES),
            },
        };
        Ok(serde_json::to_value(body)?)
    }

    /// Submit a job to the queue and return its request id.
    pub async fn submit_job(&self, request: &GenerationRequest) -> Result<QueueResponse, GenerationError> {
        let body = self.build_body(request)?;

        log::info!("Submitting {} job to fal.ai", self.variant.engine());

        // Quota and content-policy rejections are classified by the transport.
        let body = self
            .transport
            .send(
                RequestDescriptor::post(self.submit_url())
                    .header("Authorization", self.auth_header())
                    .header("Content-Type", "application/json")
                    .json(body),
            )
            .await?;

        let queue_response: QueueResponse = serde_json::from_value(body).map_err(|e| {
            GenerationError::Unknown(format!("Unexpected fal.ai queue response: {}", e))
        })?;
        log::info!("Job submitted with request_id: {}", queue_response.request_id);
        Ok(queue_response)
    }
}

#[async_trait]
impl VideoProvider for FalQueueProvider {
    fn engine(&self) -> Engine {
        self.variant.engine()
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let queue_response = self.submit_job(request).await?;
        Ok(Submission::Job(JobHandle::new(
            self.engine(),
            queue_response.request_id,
        )))
    }

    async fn check_status(&self, handle: &JobHandle) -> Result<PollStatus<Value>, GenerationError> {
        let reply = self
            .transport
            .execute(
                RequestDescriptor::get(self.request_url(&handle.external_id))
                    .header("Authorization", self.auth_header()),
            )
            .await?;

        if !reply.is_success() {
            return unsuccessful_status(&handle.external_id, &reply);
        }

        let status = reply
            .body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        log::debug!("Job {} status: {}", handle.external_id, status);

        match status.as_str() {
            "COMPLETED" | "OK" => Ok(PollStatus::Done(reply.body)),
            "FAILED" | "ERROR" => Ok(PollStatus::Failed(
                provider_message(&reply.body)
                    .unwrap_or_else(|| "Generation failed on fal.ai".to_string()),
            )),
            _ => Ok(PollStatus::Pending),
        }
    }

    async fn extract_result(
        &self,
        _handle: &JobHandle,
        completed: Value,
    ) -> Result<GenerationResult, GenerationError> {
        let url = require_first_present(&completed, RESULT_URL_POINTERS, "Video URL")?;
        GenerationResult::media_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn provider(variant: FalVariant) -> FalQueueProvider {
        FalQueueProvider::new(
            variant,
            HttpTransport::new().unwrap(),
            Credentials::with_keys([(Service::Fal, "test-key")]),
            "https://queue.fal.run/",
            "xai/grok-imagine/text-to-video",
            PollPolicy::new(Duration::from_secs(5), 100),
        )
    }

    #[test]
    fn test_urls() {
        let provider = provider(FalVariant::Grok);
        assert_eq!(
            provider.submit_url(),
            "https://queue.fal.run/xai/grok-imagine/text-to-video"
        );
        assert_eq!(
            provider.request_url("abc123"),
            "https://queue.fal.run/xai/grok-imagine/text-to-video/requests/abc123"
        );
    }

    #[test]
    fn test_grok_body() {
        let request = GenerationRequest::new(Engine::Grok, "neon city", None);
        let body = provider(FalVariant::Grok).build_body(&request).unwrap();
        assert_eq!(body, json!({"prompt": "neon city", "duration": 6}));
    }

    #[test]
    fn test_grok_rejects_empty_prompt() {
        let request = GenerationRequest::new(Engine::Grok, "  ", None);
        let result = provider(FalVariant::Grok).build_body(&request);
        assert!(matches!(result, Err(GenerationError::InvalidInput(_))));
    }

    #[test]
    fn test_wan_body_uses_default_prompt() {
        let request = GenerationRequest::new(
            Engine::WanVideo,
            "",
            Some("data:image/png;base64,aGVsbG8=".to_string()),
        );
        let body = provider(FalVariant::WanVideo).build_body(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "image_url": "data:image/png;base64,aGVsbG8=",
                "prompt": WAN_DEFAULT_PROMPT,
                "aspect_ratio": "16:9",
                "num_frames": 81
            })
        );
    }

    #[test]
    fn test_wan_requires_image() {
        let request = GenerationRequest::new(Engine::WanVideo, "fly over city", None);
        let result = provider(FalVariant::WanVideo).build_body(&request);
        assert!(matches!(result, Err(GenerationError::InvalidInput(_))));
    }

    #[test]
    fn test_queue_response_deserialization() {
        let response: QueueResponse = serde_json::from_str(r#"{"request_id": "abc123"}"#).unwrap();
        assert_eq!(response.request_id, "abc123");
        assert!(response.status_url.is_none());
    }

    #[tokio::test]
    async fn test_extract_prefers_nested_video_url() {
        let provider = provider(FalVariant::Grok);
        let handle = JobHandle::new(Engine::Grok, "abc");
        let completed = json!({
            "status": "COMPLETED",
            "response": {"video": {"url": "https://cdn/y.mp4"}, "url": "https://cdn/other.mp4"}
        });
        let result = provider.extract_result(&handle, completed).await.unwrap();
        assert_eq!(result.payload(), "https://cdn/y.mp4");
    }

    #[tokio::test]
    async fn test_extract_falls_back_to_response_url() {
        let provider = provider(FalVariant::Grok);
        let handle = JobHandle::new(Engine::Grok, "abc");
        let completed = json!({"status": "COMPLETED", "response": {"url": "https://cdn/z.mp4"}});
        let result = provider.extract_result(&handle, completed).await.unwrap();
        assert_eq!(result.payload(), "https://cdn/z.mp4");
    }

    #[tokio::test]
    async fn test_extract_without_url_is_error() {
        let provider = provider(FalVariant::Grok);
        let handle = JobHandle::new(Engine::Grok, "abc");
        let result = provider
            .extract_result(&handle, json!({"status": "COMPLETED", "response": {}}))
            .await;
        assert!(matches!(result, Err(GenerationError::Unknown(_))));
    }
}

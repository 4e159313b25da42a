//! Vyro form-upload strategy for kling and imagine-art (image-to-video).

use async_trait::async_trait;
use serde_json::Value;

use super::{unsuccessful_status, Submission, VideoProvider};
use crate::credentials::{Credentials, Service};
use crate::error::GenerationError;
use crate::generation::{Engine, GenerationRequest, GenerationResult, JobHandle};
use crate::media::{require_first_present, DataUri};
use crate::poller::{PollPolicy, PollStatus};
use crate::transport::{provider_message, FormPart, HttpTransport, RequestDescriptor};

/// Job id fields, in priority order.
const JOB_ID_POINTERS: &[&str] = &["/id", "/task_id"];

/// Video URL fields of a completed job, in priority order.
const RESULT_URL_POINTERS: &[&str] = &["/video_url", "/result", "/url"];

/// File name sent with the uploaded reference image.
const UPLOAD_FILE_NAME: &str = "input.png";

/// Which Vyro product a provider talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VyroVariant {
    Kling,
    ImagineArt,
}

impl VyroVariant {
    fn engine(&self) -> Engine {
        match self {
            VyroVariant::Kling => Engine::Kling,
            VyroVariant::ImagineArt => Engine::ImagineArt,
        }
    }

    fn service(&self) -> Service {
        match self {
            VyroVariant::Kling => Service::Kling,
            VyroVariant::ImagineArt => Service::ImagineArt,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            VyroVariant::Kling => "v2/video/image-to-video",
            VyroVariant::ImagineArt => "v1/creative/image-to-video",
        }
    }

    fn file_field(&self) -> &'static str {
        match self {
            VyroVariant::Kling => "file",
            VyroVariant::ImagineArt => "image",
        }
    }

    fn default_prompt(&self) -> &'static str {
        match self {
            VyroVariant::Kling => "Hyper-realistic motion.",
            VyroVariant::ImagineArt => "Cinematic animation",
        }
    }
}

/// Strategy for Vyro's multipart image-to-video endpoints.
pub struct VyroProvider {
    variant: VyroVariant,
    transport: HttpTransport,
    credentials: Credentials,
    base_url: String,
    style: String,
    policy: PollPolicy,
}

impl std::fmt::Debug for VyroProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VyroProvider")
            .field("variant", &self.variant)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl VyroProvider {
    /// `style` is only sent for kling.
    pub fn new(
        variant: VyroVariant,
        transport: HttpTransport,
        credentials: Credentials,
        base_url: impl Into<String>,
        style: impl Into<String>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            variant,
            transport,
            credentials,
            base_url: base_url.into(),
            style: style.into(),
            policy,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.variant.path())
    }

    fn form_parts(&self, request: &GenerationRequest) -> Result<Vec<FormPart>, GenerationError> {
        let image = DataUri::parse(request.require_image()?)?;
        let prompt = request.prompt_or(self.variant.default_prompt());
        let file = FormPart::file(self.variant.file_field(), UPLOAD_FILE_NAME, &image.mime, image.bytes);

        Ok(match self.variant {
            VyroVariant::Kling => vec![
                FormPart::text("style", self.style.clone()),
                FormPart::text("prompt", prompt),
                file,
            ],
            VyroVariant::ImagineArt => vec![file, FormPart::text("prompt", prompt)],
        })
    }
}

/// Task id from `id` or `task_id`, which may be a string or a number.
fn job_id(body: &Value) -> Option<String> {
    JOB_ID_POINTERS.iter().find_map(|pointer| match body.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl VideoProvider for VyroProvider {
    fn engine(&self) -> Engine {
        self.variant.engine()
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let parts = self.form_parts(request)?;
        let key = self.credentials.get_key(self.variant.service());

        log::info!("Uploading reference image to {}", self.endpoint());
        let body = self
            .transport
            .send(
                RequestDescriptor::post(self.endpoint())
                    .bearer(&key)
                    .multipart(parts),
            )
            .await?;

        let id = job_id(&body).ok_or_else(|| {
            GenerationError::Unknown(format!("{} returned no task id", self.engine()))
        })?;
        log::info!("{} task created: {}", self.engine(), id);
        Ok(Submission::Job(JobHandle::new(self.engine(), id)))
    }

    async fn check_status(&self, handle: &JobHandle) -> Result<PollStatus<Value>, GenerationError> {
        let key = self.credentials.get_key(self.variant.service());
        let reply = self
            .transport
            .execute(
                RequestDescriptor::get(format!("{}/{}", self.endpoint(), handle.external_id))
                    .bearer(&key),
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
            .to_lowercase();
        log::debug!("{} task {} status: {}", self.engine(), handle.external_id, status);

        match status.as_str() {
            "completed" | "success" => Ok(PollStatus::Done(reply.body)),
            "failed" | "error" => Ok(PollStatus::Failed(
                provider_message(&reply.body)
                    .unwrap_or_else(|| format!("{} task failed", self.engine())),
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

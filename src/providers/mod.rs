//! Video generation strategies, one per upstream backend.
//!
//! Each strategy implements [`VideoProvider`]. Synchronous backends resolve
//! in `submit`; queue-based ones return a [`JobHandle`] that [`run`] polls
//! through `check_status` and resolves with `extract_result`.

mod fal;
mod script;
mod stock;
mod veo;
mod vyro;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{is_quota_message, GenerationError};
use crate::generation::{Engine, GenerationRequest, GenerationResult, JobHandle};
use crate::poller::{PollPolicy, PollStatus, Poller, Sleeper};
use crate::transport::{classify_status, provider_message, HttpReply};

pub use fal::{FalQueueProvider, FalVariant, QueueResponse};
pub use script::{ScriptProvider, SCRIPT_UNAVAILABLE};
pub use stock::{PhotoHit, SearchKind, StockProvider, StockResults, VideoHit};
pub use veo::VeoProvider;
pub use vyro::{VyroProvider, VyroVariant};

/// What a provider hands back from `submit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The job was queued; poll it.
    Job(JobHandle),
    /// The provider answered synchronously.
    Ready(GenerationResult),
}

/// Capability interface shared by every backend.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Engine this strategy serves.
    fn engine(&self) -> Engine;

    /// Interval and budget for `check_status`.
    fn poll_policy(&self) -> PollPolicy;

    /// Validate the request and hand it to the provider.
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError>;

    /// Query a queued job once.
    async fn check_status(&self, handle: &JobHandle) -> Result<PollStatus<Value>, GenerationError> {
        Err(GenerationError::Unknown(format!(
            "{} has no job queue to poll (job {})",
            self.engine(),
            handle.external_id
        )))
    }

    /// Turn a completed job's payload into the final result.
    async fn extract_result(
        &self,
        handle: &JobHandle,
        _completed: Value,
    ) -> Result<GenerationResult, GenerationError> {
        Err(GenerationError::Unknown(format!(
            "{} produced no result for job {}",
            self.engine(),
            handle.external_id
        )))
    }
}

/// Interpret a non-success reply from a queue's status endpoint.
///
/// A quota message fails the job. Routing misses (404), throttling (429) and
/// server errors leave it pending. Anything else, such as a rejected key, is
/// raised through the usual status mapping.
pub(crate) fn unsuccessful_status(
    job_id: &str,
    reply: &HttpReply,
) -> Result<PollStatus<Value>, GenerationError> {
    if let Some(message) = provider_message(&reply.body).filter(|m| is_quota_message(m)) {
        return Ok(PollStatus::Failed(message));
    }

    if reply.status == 404 || reply.status == 429 || reply.status >= 500 {
        log::debug!("Status check for {} returned {}", job_id, reply.status);
        return Ok(PollStatus::Pending);
    }

    log::warn!("Status check for {} rejected with {}", job_id, reply.status);
    Err(classify_status(reply.status, &reply.body))
}

/// Submit, then poll until a terminal outcome, then extract the result.
pub async fn run(
    provider: &dyn VideoProvider,
    request: &GenerationRequest,
    sleeper: Arc<dyn Sleeper>,
) -> Result<GenerationResult, GenerationError> {
    let handle = match provider.submit(request).await? {
        Submission::Ready(result) => return Ok(result),
        Submission::Job(handle) => handle,
    };

    log::info!(
        "{} job {} submitted, polling for completion",
        handle.provider,
        handle.external_id
    );

    let poller = Poller::new(provider.poll_policy(), sleeper);
    let completed = poller
        .poll_until_done(|_| provider.check_status(&handle))
        .await?;

    let result = provider.extract_result(&handle, completed).await?;
    log::info!(
        "{} job {} resolved after {:?}",
        handle.provider,
        handle.external_id,
        handle.created_at.elapsed().unwrap_or_default()
    );
    Ok(result)
}

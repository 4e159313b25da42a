//! Pexels stock footage: the `stock` engine plus photo/video browsing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Submission, VideoProvider};
use crate::credentials::{Credentials, Service};
use crate::error::GenerationError;
use crate::generation::{validate_prompt, Engine, GenerationRequest, GenerationResult};
use crate::poller::PollPolicy;
use crate::transport::{HttpTransport, RequestDescriptor};

/// Pexels API response structures
mod pexels {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct SearchResponse {
        #[serde(default)]
        pub photos: Option<Vec<Photo>>,
        #[serde(default)]
        pub videos: Option<Vec<Video>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Photo {
        pub id: u64,
        #[serde(default)]
        pub photographer: String,
        pub src: PhotoSrc,
    }

    #[derive(Debug, Deserialize)]
    pub struct PhotoSrc {
        pub original: String,
        #[serde(default)]
        pub medium: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Video {
        pub id: u64,
        #[serde(default)]
        pub image: String,
        #[serde(default)]
        pub duration: u32,
        #[serde(default)]
        pub user: Option<VideoUser>,
        #[serde(default)]
        pub video_files: Vec<VideoFile>,
    }

    #[derive(Debug, Deserialize)]
    pub struct VideoUser {
        #[serde(default)]
        pub name: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct VideoFile {
        #[serde(default)]
        pub link: String,
    }
}

/// Which Pexels catalogue to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Photos,
    Videos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoHit {
    pub id: u64,
    pub thumbnail: String,
    pub author: String,
    pub duration_secs: u32,
    /// First playable file, if Pexels listed any.
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoHit {
    pub id: u64,
    pub photographer: String,
    pub original: String,
    pub medium: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockResults {
    pub videos: Vec<VideoHit>,
    pub photos: Vec<PhotoHit>,
}

impl From<pexels::Video> for VideoHit {
    fn from(video: pexels::Video) -> Self {
        Self {
            id: video.id,
            thumbnail: video.image,
            author: video.user.map(|u| u.name).unwrap_or_default(),
            duration_secs: video.duration,
            link: video
                .video_files
                .into_iter()
                .map(|file| file.link)
                .find(|link| !link.trim().is_empty()),
        }
    }
}

impl From<pexels::Photo> for PhotoHit {
    fn from(photo: pexels::Photo) -> Self {
        Self {
            id: photo.id,
            photographer: photo.photographer,
            original: photo.src.original,
            medium: photo.src.medium,
        }
    }
}

/// Pexels search client.
#[derive(Debug)]
pub struct StockProvider {
    transport: HttpTransport,
    credentials: Credentials,
    base_url: String,
}

impl StockProvider {
    pub fn new(transport: HttpTransport, credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.into(),
        }
    }

    fn search_url(&self, kind: SearchKind) -> String {
        let base = self.base_url.trim_end_matches('/');
        match kind {
            SearchKind::Videos => format!("{}/videos/search", base),
            SearchKind::Photos => format!("{}/v1/search", base),
        }
    }

    /// Search one catalogue. Pexels takes the key without a scheme prefix.
    pub async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        per_page: u32,
    ) -> Result<StockResults, GenerationError> {
        validate_prompt(query)?;
        let key = self.credentials.get_key(Service::Pexels);

        let body = self
            .transport
            .send(
                RequestDescriptor::get(self.search_url(kind))
                    .header("Authorization", key)
                    .query("query", query.trim())
                    .query("per_page", per_page.max(1).to_string()),
            )
            .await?;

        let response: pexels::SearchResponse = serde_json::from_value(body).map_err(|e| {
            GenerationError::Unknown(format!("Unexpected Pexels response: {}", e))
        })?;

        let results = StockResults {
            videos: response
                .videos
                .unwrap_or_default()
                .into_iter()
                .map(VideoHit::from)
                .collect(),
            photos: response
                .photos
                .unwrap_or_default()
                .into_iter()
                .map(PhotoHit::from)
                .collect(),
        };
        log::debug!(
            "Pexels returned {} videos and {} photos for '{}'",
            results.videos.len(),
            results.photos.len(),
            query
        );
        Ok(results)
    }
}

#[async_trait]
impl VideoProvider for StockProvider {
    fn engine(&self) -> Engine {
        Engine::Stock
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(std::time::Duration::ZERO, 1)
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let results = self.search(&request.prompt, SearchKind::Videos, 1).await?;

        let first = results.videos.into_iter().next().ok_or_else(|| {
            GenerationError::InvalidInput(format!(
                "No stock footage found for '{}'",
                request.prompt.trim()
            ))
        })?;
        let link = first.link.ok_or_else(|| {
            GenerationError::InvalidInput(format!("Stock video {} has no playable file", first.id))
        })?;

        Ok(Submission::Ready(GenerationResult::media_url(link)?))
    }
}

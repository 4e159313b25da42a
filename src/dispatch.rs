//! Routes a generation request to the strategy that serves its engine.

use std::sync::Arc;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::GenerationError;
use crate::gemini::GeminiClient;
use crate::generation::{Engine, GenerationRequest, GenerationResult};
use crate::media::BlobStore;
use crate::poller::Sleeper;
use crate::providers::{
    self, FalQueueProvider, FalVariant, ScriptProvider, SearchKind, StockProvider, StockResults,
    VeoProvider, VideoProvider, VyroProvider, VyroVariant,
};
use crate::transport::HttpTransport;

/// One strategy per engine, built once and shared by every call.
pub struct Dispatcher {
    grok: FalQueueProvider,
    wan_video: FalQueueProvider,
    kling: VyroProvider,
    imagine_art: VyroProvider,
    qwen: ScriptProvider,
    stock: StockProvider,
    veo: VeoProvider,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        config: &Config,
        credentials: Credentials,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, GenerationError> {
        let transport = HttpTransport::new()?;
        let endpoints = &config.endpoints;
        let models = &config.models;
        let polling = &config.polling;
        let gemini = GeminiClient::new(transport.clone(), credentials.clone(), endpoints.gemini.clone());

        Ok(Self {
            grok: FalQueueProvider::new(
                FalVariant::Grok,
                transport.clone(),
                credentials.clone(),
                endpoints.fal.clone(),
                models.grok.clone(),
                polling.fal.policy(),
            ),
            wan_video: FalQueueProvider::new(
                FalVariant::WanVideo,
                transport.clone(),
                credentials.clone(),
                endpoints.fal.clone(),
                models.wan_video.clone(),
                polling.fal.policy(),
            ),
            kling: VyroProvider::new(
                VyroVariant::Kling,
                transport.clone(),
                credentials.clone(),
                endpoints.vyro.clone(),
                models.kling_style.clone(),
                polling.kling.policy(),
            ),
            imagine_art: VyroProvider::new(
                VyroVariant::ImagineArt,
                transport.clone(),
                credentials.clone(),
                endpoints.vyro.clone(),
                String::new(),
                polling.imagine_art.policy(),
            ),
            qwen: ScriptProvider::new(
                transport.clone(),
                credentials.clone(),
                endpoints.openrouter.clone(),
                models.script.clone(),
                gemini.clone(),
                models.chat.clone(),
            ),
            stock: StockProvider::new(transport, credentials, endpoints.pexels.clone()),
            veo: VeoProvider::new(
                gemini,
                models.veo.clone(),
                BlobStore::new(config.storage.blob_dir()),
                polling.veo.policy(),
            ),
            sleeper,
        })
    }

    fn provider(&self, engine: Engine) -> &dyn VideoProvider {
        match engine {
            Engine::Grok => &self.grok,
            Engine::WanVideo => &self.wan_video,
            Engine::Kling => &self.kling,
            Engine::ImagineArt => &self.imagine_art,
            Engine::Qwen => &self.qwen,
            Engine::Stock => &self.stock,
            Engine::Veo => &self.veo,
        }
    }

    /// Run one generation to completion. Errors pass through untranslated.
    pub async fn generate(
        &self,
        engine: Engine,
        prompt: &str,
        reference_image: Option<String>,
    ) -> Result<GenerationResult, GenerationError> {
        let request = GenerationRequest::new(engine, prompt, reference_image);
        log::info!("Generating with {}", engine);

        let result = providers::run(self.provider(engine), &request, self.sleeper.clone()).await;
        match &result {
            Ok(result) => log::info!("{} produced a {:?} result", engine, result.kind()),
            Err(e) => log::error!("{} generation failed: {}", engine, e),
        }
        result
    }

    /// Browse Pexels without picking a single clip.
    pub async fn search_stock(
        &self,
        query: &str,
        kind: SearchKind,
        per_page: u32,
    ) -> Result<StockResults, GenerationError> {
        self.stock.search(query, kind, per_page).await
    }
}

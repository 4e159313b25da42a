//! End-to-end generation tests through the dispatcher against mock providers.
//!
//! These tests cover:
//! - Synchronous engines (stock, qwen)
//! - Queue polling (grok, kling) including budgets and timeouts
//! - Fail-fast validation with zero network calls
//! - Quota exhaustion at submit, at job failure and in status replies
//! - Veo download into the blob store

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ai_hub::config::{Config, EndpointsConfig, PollSettings};
use ai_hub::credentials::{Credentials, Service};
use ai_hub::generation::{Engine, ResultKind};
use ai_hub::media::{path_from_file_url, DataUri};
use ai_hub::providers::SearchKind;
use ai_hub::{Dispatcher, GenerationError, RecordingSleeper};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROK_PATH: &str = "/xai/grok-imagine/text-to-video";
const KLING_PATH: &str = "/v2/video/image-to-video";
const IMAGINE_ART_PATH: &str = "/v1/creative/image-to-video";

fn test_config(server: &MockServer, blob_dir: &Path) -> Config {
    let mut config = Config {
        endpoints: EndpointsConfig::all(&server.uri()),
        ..Config::default()
    };
    config.storage.blob_dir = Some(blob_dir.to_path_buf());
    config
}

fn credentials() -> Credentials {
    Credentials::with_keys([
        (Service::Fal, "fal-key"),
        (Service::Kling, "kling-key"),
        (Service::ImagineArt, "imagine-key"),
        (Service::Openrouter, "or-key"),
        (Service::Gemini, "gemini-key"),
        (Service::Pexels, "px-key"),
    ])
}

fn dispatcher(config: &Config) -> (Dispatcher, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let dispatcher = Dispatcher::new(config, credentials(), Arc::new(sleeper.clone())).unwrap();
    (dispatcher, sleeper)
}

fn reference_image() -> Option<String> {
    Some(DataUri::encode("image/png", b"\x89PNG fake"))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

// === Stock ===

#[tokio::test]
async fn test_stock_returns_first_video_file() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .and(query_param("query", "ocean waves"))
        .and(query_param("per_page", "1"))
        .and(header("Authorization", "px-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "per_page": 1,
            "videos": [{
                "id": 1,
                "image": "https://images/1.jpg",
                "duration": 10,
                "user": {"id": 9, "name": "Ana"},
                "video_files": [{"id": 2, "link": "https://cdn/x.mp4"}]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::Stock, "ocean waves", None)
        .await
        .unwrap();

    assert_eq!(result.kind(), ResultKind::MediaUrl);
    assert_eq!(result.payload(), "https://cdn/x.mp4");
}

#[tokio::test]
async fn test_stock_without_results_is_invalid_input() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"videos": []})))
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.generate(Engine::Stock, "zzzz", None).await;

    assert!(matches!(result, Err(GenerationError::InvalidInput(_))));
}

#[tokio::test]
async fn test_stock_photo_search() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "photos": [
                {"id": 1, "photographer": "Lee", "src": {"original": "https://p/1.jpg", "medium": "https://p/1m.jpg"}},
                {"id": 2, "photographer": "Kim", "src": {"original": "https://p/2.jpg", "medium": "https://p/2m.jpg"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let results = dispatcher
        .search_stock("forest", SearchKind::Photos, 2)
        .await
        .unwrap();

    assert!(results.videos.is_empty());
    assert_eq!(results.photos.len(), 2);
    assert_eq!(results.photos[1].photographer, "Kim");
}

#[tokio::test]
async fn test_stock_search_rejects_blank_query() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.search_stock("   ", SearchKind::Videos, 5).await;

    assert!(matches!(result, Err(GenerationError::InvalidInput(_))));
    assert_eq!(request_count(&server).await, 0);
}

// === Fail-fast validation ===

#[tokio::test]
async fn test_image_engines_without_image_make_no_requests() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();
    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));

    for engine in [Engine::WanVideo, Engine::Kling, Engine::ImagineArt] {
        let result = dispatcher.generate(engine, "fly over city", None).await;
        match result {
            Err(GenerationError::InvalidInput(message)) => {
                assert!(message.contains("requires a reference image"), "{}", message)
            }
            other => panic!("Expected InvalidInput for {}, got {:?}", engine, other),
        }
    }

    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_grok_empty_prompt_makes_no_requests() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();
    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));

    let result = dispatcher.generate(Engine::Grok, "   ", None).await;

    assert!(matches!(result, Err(GenerationError::InvalidInput(_))));
    assert_eq!(request_count(&server).await, 0);
}

// === fal.ai queue ===

#[tokio::test]
async fn test_grok_polls_until_completed() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .and(header("Authorization", "Key fal-key"))
        .and(body_json(json!({"prompt": "neon city", "duration": 6})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "req-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/req-1", GROK_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "IN_PROGRESS"})))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/req-1", GROK_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "COMPLETED",
            "response": {"video": {"url": "https://cdn/y.mp4"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, sleeper) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::Grok, "neon city", None)
        .await
        .unwrap();

    assert_eq!(result.payload(), "https://cdn/y.mp4");
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(5); 3]);
}

#[tokio::test]
async fn test_wan_video_treats_error_status_as_pending() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();
    let wan_path = "/fal-ai/wan-video/v2.1/image-to-video";

    Mock::given(method("POST"))
        .and(path(wan_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "w-1"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/w-1", wan_path)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/w-1", wan_path)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "COMPLETED",
            "response": {"url": "https://cdn/w.mp4"}
        })))
        .mount(&server)
        .await;

    let (dispatcher, sleeper) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::WanVideo, "", reference_image())
        .await
        .unwrap();

    assert_eq!(result.payload(), "https://cdn/w.mp4");
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_grok_times_out_after_budget() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "slow"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/slow", GROK_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "IN_QUEUE"})))
        .expect(5)
        .mount(&server)
        .await;

    let mut config = test_config(&server, blobs.path());
    config.polling.fal = PollSettings {
        interval_ms: 5_000,
        max_attempts: 5,
    };
    let (dispatcher, sleeper) = dispatcher(&config);

    let result = dispatcher.generate(Engine::Grok, "slow render", None).await;

    assert_eq!(result, Err(GenerationError::Timeout { attempts: 5 }));
    assert_eq!(sleeper.delays().len(), 4);
}

#[tokio::test]
async fn test_grok_submit_with_exhausted_balance() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "User is locked. Reason: Exhausted balance. Top up your balance at fal.ai/dashboard/billing."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.generate(Engine::Grok, "neon city", None).await;

    assert!(matches!(result, Err(GenerationError::QuotaExhausted { .. })));
}

#[tokio::test]
async fn test_grok_job_failure_with_exhausted_balance() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "req-q"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/req-q", GROK_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAILED",
            "error": "Exhausted balance"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.generate(Engine::Grok, "neon city", None).await;

    assert_eq!(
        result,
        Err(GenerationError::QuotaExhausted {
            message: "Exhausted balance".to_string()
        })
    );
}

#[tokio::test]
async fn test_grok_job_failure_is_provider_unavailable() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "req-f"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/req-f", GROK_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAILED",
            "error": "GPU worker crashed"
        })))
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.generate(Engine::Grok, "neon city", None).await;

    match result {
        Err(GenerationError::ProviderUnavailable { message, .. }) => {
            assert!(message.contains("GPU worker crashed"))
        }
        other => panic!("Expected ProviderUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_grok_status_reply_with_exhausted_balance() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "q"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/q", GROK_PATH)))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "User is locked. Reason: Exhausted balance."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, blobs.path());
    config.polling.fal = PollSettings {
        interval_ms: 5_000,
        max_attempts: 5,
    };
    let (dispatcher, sleeper) = dispatcher(&config);
    let result = dispatcher.generate(Engine::Grok, "neon city", None).await;

    assert!(matches!(result, Err(GenerationError::QuotaExhausted { .. })));
    assert_eq!(request_count(&server).await, 2);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_grok_status_reply_with_rejected_key_stops_polling() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(GROK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "k"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/requests/k", GROK_PATH)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid key"})))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.generate(Engine::Grok, "neon city", None).await;

    assert!(matches!(
        result,
        Err(GenerationError::ProviderUnavailable {
            status: Some(401),
            ..
        })
    ));
}

// === Vyro form upload ===

#[tokio::test]
async fn test_kling_uploads_and_polls() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(KLING_PATH))
        .and(header("Authorization", "Bearer kling-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/t-1", KLING_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/t-1", KLING_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Completed",
            "result": "https://cdn/k.mp4"
        })))
        .mount(&server)
        .await;

    let (dispatcher, sleeper) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::Kling, "", reference_image())
        .await
        .unwrap();

    assert_eq!(result.payload(), "https://cdn/k.mp4");
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(5)]);

    let requests = server.received_requests().await.unwrap();
    let upload = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(upload.contains("kling-1.0-pro"));
    assert!(upload.contains("Hyper-realistic motion."));
    assert!(upload.contains("filename=\"input.png\""));
}

#[tokio::test]
async fn test_imagine_art_failed_task() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(IMAGINE_ART_PATH))
        .and(header("Authorization", "Bearer imagine-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ia-1"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/ia-1", IMAGINE_ART_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "message": "Image could not be processed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::ImagineArt, "slow zoom", reference_image())
        .await;

    assert!(matches!(
        result,
        Err(GenerationError::ProviderUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_imagine_art_completed_without_url_is_unknown() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(IMAGINE_ART_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ia-2"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/ia-2", IMAGINE_ART_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::ImagineArt, "slow zoom", reference_image())
        .await;

    assert!(matches!(result, Err(GenerationError::Unknown(_))));
}

// === qwen script ===

#[tokio::test]
async fn test_qwen_empty_primary_falls_back_to_gemini() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": ""}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-flash-preview:generateContent"))
        .and(header("x-goog-api-key", "gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "EXT. ROOFTOP - NIGHT"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::Qwen, "rooftop chase", None)
        .await
        .unwrap();

    assert_eq!(result.kind(), ResultKind::Text);
    assert_eq!(result.payload(), "EXT. ROOFTOP - NIGHT");
}

// === Veo ===

#[tokio::test]
async fn test_veo_downloads_into_blob_store() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-fast-generate-preview:predictLongRunning"))
        .and(header("x-goog-api-key", "gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operations/op-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-1",
            "done": false
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-1",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [
                {"video": {"uri": format!("{}/files/video.mp4", server.uri())}}
            ]}}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/video.mp4"))
        .and(header("x-goog-api-key", "gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake-mp4".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, sleeper) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::Veo, "drone shot", None)
        .await
        .unwrap();

    assert_eq!(result.kind(), ResultKind::BlobUrl);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(10)]);

    let stored = path_from_file_url(result.payload()).unwrap();
    assert!(stored.starts_with(blobs.path()));
    assert_eq!(std::fs::read(stored).unwrap(), b"fake-mp4");
}

#[tokio::test]
async fn test_veo_operation_error_fails() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-fast-generate-preview:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operations/op-2"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op-2",
            "done": true,
            "error": {"code": 3, "message": "Prompt was rejected"}
        })))
        .mount(&server)
        .await;

    let (dispatcher, _) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher.generate(Engine::Veo, "drone shot", None).await;

    match result {
        Err(GenerationError::ProviderUnavailable { message, .. }) => {
            assert!(message.contains("Prompt was rejected"))
        }
        other => panic!("Expected ProviderUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_kling_status_reply_with_exhausted_balance() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(KLING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/42", KLING_PATH)))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "message": "Exhausted balance"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (dispatcher, sleeper) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::Kling, "", reference_image())
        .await;

    assert!(matches!(result, Err(GenerationError::QuotaExhausted { .. })));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_imagine_art_status_outage_stays_pending() {
    let server = MockServer::start().await;
    let blobs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(IMAGINE_ART_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ia-2"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/ia-2", IMAGINE_ART_PATH)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/ia-2", IMAGINE_ART_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "video_url": "https://cdn/ia.mp4"
        })))
        .mount(&server)
        .await;

    let (dispatcher, sleeper) = dispatcher(&test_config(&server, blobs.path()));
    let result = dispatcher
        .generate(Engine::ImagineArt, "slow zoom", reference_image())
        .await
        .unwrap();

    assert_eq!(result.payload(), "https://cdn/ia.mp4");
    assert_eq!(sleeper.delays().len(), 1);
}

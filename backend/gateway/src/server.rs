//! Main HTTP Gateway Server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use ocr_bridge_core::AppContext;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::health_api;
use crate::ocr_api;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub ctx: Arc<AppContext>,
    /// Answer undecodable payloads with 400 instead of 500.
    pub strict_client_errors: bool,
}

impl GatewayState {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            strict_client_errors: false,
        }
    }

    pub fn with_strict_client_errors(mut self, strict: bool) -> Self {
        self.strict_client_errors = strict;
        self
    }
}

pub fn build_router(state: GatewayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_api::get_health))
        .route("/", get(health_api::get_root))
        .route("/docs", get(health_api::get_docs))
        .route("/ocr", post(ocr_api::post_ocr))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Gateway HTTP server stopped");
    Ok(())
}

/// Starts the bridge HTTP server.
#[instrument(skip(state, shutdown))]
pub async fn start_server<F>(
    addr: SocketAddr,
    state: GatewayState,
    max_body_bytes: usize,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state, max_body_bytes);
    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway HTTP server listening on {}", listener.local_addr()?);
    serve(listener, app, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use ocr_bridge_core::testing::{encode_png_base64, EchoVisionModel, StaticOcrEngine};
    use ocr_bridge_core::{InferenceAdapter, ModelHandle, Tier};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::oneshot;

    const LIMIT: usize = 50 * 1024 * 1024;

    struct TestServer {
        base: String,
        ctx: Arc<AppContext>,
        stop: Option<oneshot::Sender<()>>,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    async fn spawn(ctx: AppContext, strict: bool, limit: usize) -> TestServer {
        let ctx = Arc::new(ctx);
        let state = GatewayState::new(Arc::clone(&ctx)).with_strict_client_errors(strict);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, build_router(state, limit), async {
            let _ = rx.await;
        }));
        TestServer {
            base: format!("http://{addr}"),
            ctx,
            stop: Some(tx),
            task,
        }
    }

    fn eco(output: Value) -> AppContext {
        let ctx = AppContext::new(Tier::Eco, "PP-OCRv4-Mobile", InferenceAdapter::default());
        ctx.install(ModelHandle::Ocr(Arc::new(StaticOcrEngine::new(output))))
            .unwrap();
        ctx
    }

    fn png() -> String {
        encode_png_base64(&RgbImage::new(16, 16))
    }

    async fn post_ocr(base: &str, body: Value) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{base}/ocr"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get_json(url: String) -> Value {
        reqwest::get(url).await.unwrap().json().await.unwrap()
    }

    #[tokio::test]
    async fn health_reports_loading_then_ok() {
        let ctx = AppContext::new(Tier::Eco, "PP-OCRv4-Mobile", InferenceAdapter::default());
        let server = spawn(ctx, false, LIMIT).await;

        let health = get_json(format!("{}/health", server.base)).await;
        assert_eq!(
            health,
            json!({ "status": "loading", "busy": false, "tier": "eco", "model": "PP-OCRv4-Mobile" })
        );

        server
            .ctx
            .install(ModelHandle::Ocr(Arc::new(StaticOcrEngine::new(json!([])))))
            .unwrap();
        let health = get_json(format!("{}/health", server.base)).await;
        assert_eq!(health["status"], "ok");
    }

    #[tokio::test]
    async fn root_points_at_docs() {
        let server = spawn(eco(json!([])), false, LIMIT).await;
        let root = get_json(format!("{}/", server.base)).await;
        assert_eq!(root["docs_url"], "/docs");
        assert!(root["message"].as_str().unwrap().contains("port 3000"));

        let docs = get_json(format!("{}/docs", server.base)).await;
        let paths: Vec<_> = docs["routes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["path"].as_str().unwrap().to_string())
            .collect();
        assert!(paths.contains(&"/ocr".to_string()));
    }

    #[tokio::test]
    async fn not_ready_is_503() {
        let ctx = AppContext::new(Tier::Eco, "PP-OCRv4-Mobile", InferenceAdapter::default());
        let server = spawn(ctx, false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": png() })).await;
        assert_eq!(status, 503);
        assert_eq!(body["detail"], "OCR Engine not ready yet. Please wait.");

        let ctx = AppContext::new(Tier::Lite, "vl", InferenceAdapter::default());
        let server = spawn(ctx, false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": png() })).await;
        assert_eq!(status, 503);
        assert_eq!(body["detail"], "VLM not loaded");
    }

    #[tokio::test]
    async fn structured_and_legacy_results() {
        let server = spawn(eco(json!([{ "rec_texts": ["Invoice", "#123"] }])), false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": png() })).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "result": "Invoice #123" }));

        let legacy = json!([[[[[0, 0], [10, 0], [10, 5], [0, 5]], ["Total: $50", 0.98]]]]);
        let server = spawn(eco(legacy), false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": png() })).await;
        assert_eq!(status, 200);
        assert_eq!(body["result"], "Total: $50");

        let single_page = json!([[[[0, 0], [10, 0], [10, 5], [0, 5]], ["Total: $50", 0.98]]]);
        let server = spawn(eco(single_page), false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": png() })).await;
        assert_eq!(status, 200);
        assert_eq!(body["result"], "Total: $50");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_engine_serves_real_image() {
        use ocr_bridge_core::OcrEngineOptions;
        use ocr_bridge_understanding::CommandOcrEngine;

        let dir = std::env::temp_dir().join(format!("ocr-bridge-cmd-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let script = dir.join("engine.sh");
        tokio::fs::write(
            &script,
            concat!(
                "case \"$1\" in *.png) ;; *) echo \"not a png: $1\" >&2; exit 2 ;; esac\n",
                "test -s \"$1\" || { echo \"empty image\" >&2; exit 3; }\n",
                "echo \"loading model for $2\"\n",
                "echo '[[[[0,0],[9,0],[9,9],[0,9]],[\"  Total:\",0.9]],[[[0,0]],[\"$50  \",0.8]]]'\n",
            ),
        )
        .await
        .unwrap();

        let command = vec!["sh".to_string(), script.display().to_string(), "{image}".into(), "{lang}".into()];
        let engine = CommandOcrEngine::new(&command, OcrEngineOptions::default()).unwrap();
        let ctx = AppContext::new(Tier::Eco, "PP-OCRv4-Mobile", InferenceAdapter::new(dir.clone(), "read"));
        ctx.install(ModelHandle::Ocr(Arc::new(engine))).unwrap();
        let server = spawn(ctx, false, LIMIT).await;

        let mut image = RgbImage::new(40, 12);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 6) as u8, 255, 0]);
        }
        let (status, body) =
            post_ocr(&server.base, json!({ "image_base64": encode_png_base64(&image) })).await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body, json!({ "result": "Total: $50" }));

        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .count();
        assert_eq!(leftovers, 0);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn vision_reply_returned_verbatim() {
        let ctx = AppContext::new(Tier::Pro, "PaddleOCR-VL", InferenceAdapter::default());
        ctx.install(ModelHandle::Vision(Arc::new(EchoVisionModel::new("  # Title\n| a | b |\n"))))
            .unwrap();
        let server = spawn(ctx, false, LIMIT).await;
        let data_url = format!("data:image/png;base64,{}", png());
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": data_url })).await;
        assert_eq!(status, 200);
        assert_eq!(body["result"], "  # Title\n| a | b |\n");
    }

    #[tokio::test]
    async fn invalid_base64_is_500_and_server_survives() {
        let server = spawn(eco(json!([])), false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": "***not base64***" })).await;
        assert_eq!(status, 500);
        assert!(!body["detail"].as_str().unwrap().is_empty());

        let health = get_json(format!("{}/health", server.base)).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["busy"], false);
    }

    #[tokio::test]
    async fn strict_mode_reports_client_errors_as_400() {
        let server = spawn(eco(json!([])), true, LIMIT).await;
        let (status, _) = post_ocr(&server.base, json!({ "image_base64": "@@@" })).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn inference_failure_is_500() {
        let ctx = AppContext::new(Tier::Eco, "PP-OCRv4-Mobile", InferenceAdapter::default());
        ctx.install(ModelHandle::Ocr(Arc::new(StaticOcrEngine::failing("engine crashed"))))
            .unwrap();
        let server = spawn(ctx, true, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image_base64": png() })).await;
        assert_eq!(status, 500);
        assert!(body["detail"].as_str().unwrap().contains("engine crashed"));
    }

    #[tokio::test]
    async fn malformed_body_is_422() {
        let server = spawn(eco(json!([])), false, LIMIT).await;
        let (status, body) = post_ocr(&server.base, json!({ "image": "abc" })).await;
        assert_eq!(status, 422);
        assert!(body["detail"].is_string());

        let resp = reqwest::Client::new()
            .post(format!("{}/ocr", server.base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let server = spawn(eco(json!([])), false, 1024).await;
        let big = "A".repeat(4096);
        let (status, _) = post_ocr(&server.base, json!({ "image_base64": big })).await;
        assert_eq!(status, 413);
    }

    #[tokio::test]
    async fn concurrent_requests_complete() {
        let ctx = AppContext::new(Tier::Eco, "PP-OCRv4-Mobile", InferenceAdapter::default());
        let engine = StaticOcrEngine::new(json!([{ "rec_texts": ["ok"] }]))
            .with_delay(Duration::from_millis(30));
        ctx.install(ModelHandle::Ocr(Arc::new(engine))).unwrap();
        let server = spawn(ctx, false, LIMIT).await;

        let requests: Vec<_> = (0..6)
            .map(|_| {
                let base = server.base.clone();
                tokio::spawn(async move { post_ocr(&base, json!({ "image_base64": png() })).await })
            })
            .collect();
        for request in requests {
            let (status, body) = request.await.unwrap();
            assert_eq!(status, 200);
            assert_eq!(body["result"], "ok");
        }
    }

    #[tokio::test]
    async fn graceful_shutdown_stops_server() {
        let mut server = spawn(eco(json!([])), false, LIMIT).await;
        if let Some(stop) = server.stop.take() {
            stop.send(()).unwrap();
        }
        let outcome = tokio::time::timeout(Duration::from_secs(5), server.task).await;
        assert!(outcome.unwrap().unwrap().is_ok());
    }
}

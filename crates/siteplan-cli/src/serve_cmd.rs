use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use siteplan_core::extract::extract_text;
use siteplan_core::{
    DocumentIndex, Estimator, OpenAiGenerator, PlanSynthesizer, ProjectContext, ProjectPlan,
};

use crate::config::SiteplanConfig;

const SERVICE_NAME: &str = "siteplan";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of search results.
const DEFAULT_SEARCH_K: usize = 5;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            message: msg.into(),
        }
    }

    /// Keep the status axum assigns, e.g. 413 when the body limit is hit.
    pub fn from_multipart(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State and response types
// ---------------------------------------------------------------------------

/// Shared by every handler. The synthesizer and index are safe to use from
/// concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<PlanSynthesizer>,
    pub index: Arc<DocumentIndex>,
    pub request_timeout: Duration,
    /// Request body limit for document uploads.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the OpenAI generator, rate table and a fresh index together.
    pub fn from_config(config: &SiteplanConfig) -> Self {
        let index = Arc::new(DocumentIndex::new());
        let llm = Arc::new(OpenAiGenerator::new(config.llm.clone()));
        let synthesizer = PlanSynthesizer::new(llm, Estimator::new(config.rates.clone()))
            .with_index(Arc::clone(&index));
        Self {
            synthesizer: Arc::new(synthesizer),
            index,
            request_timeout: config.request_timeout,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub filename: String,
    pub doc_id: String,
    pub characters: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    DEFAULT_SEARCH_K
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub status: &'static str,
    pub plan: ProjectPlan,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/ingest/document", post(ingest_document).layer(upload_limit))
        .route("/documents/search", get(search_documents))
        .route("/generate/plan", post(generate_plan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(config: &SiteplanConfig) -> Result<()> {
    let app = build_router(AppState::from_config(config));
    let listener = bind_listener(&config.bind, config.port).await?;
    let addr = listener.local_addr()?;
    tracing::info!(model = %config.llm.model, "siteplan serve listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("siteplan serve shut down");
    Ok(())
}

/// Bind `(host, port)` through the resolver. Accepts IPv4 and bare IPv6
/// literals as well as host names.
async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host} port {port}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: VERSION,
        health: "/health",
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: VERSION,
    })
}

async fn ingest_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(AppError::from_multipart)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(AppError::from_multipart)?;

        let text = tokio::task::spawn_blocking(move || extract_text(&bytes))
            .await
            .map_err(|e| AppError::internal(e.into()))?;
        let characters = text.chars().count();
        let doc_id = state.index.add(filename.clone(), text);
        tracing::info!(doc_id = %doc_id, filename = %filename, characters, "document ingested");

        return Ok(Json(IngestResponse {
            status: "success",
            filename,
            doc_id: doc_id.to_string(),
            characters,
        }));
    }
    Err(AppError::bad_request("multipart field \"file\" is required"))
}

async fn search_documents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    Json(SearchResponse {
        results: state.index.search(&params.q, params.k),
    })
}

async fn generate_plan(
    State(state): State<AppState>,
    Json(ctx): Json<ProjectContext>,
) -> Result<Json<PlanResponse>, AppError> {
    let plan = tokio::time::timeout(state.request_timeout, state.synthesizer.synthesize(&ctx))
        .await
        .map_err(|_| {
            tracing::warn!(project_id = %ctx.project_id, "plan generation timed out");
            AppError::timeout(format!(
                "plan generation exceeded {}s",
                state.request_timeout.as_secs_f64()
            ))
        })?;

    Ok(Json(PlanResponse {
        status: "success",
        plan,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use siteplan_core::extract::EXTRACTION_FAILED;
    use siteplan_core::llm::TextGenerator;
    use siteplan_core::{DocumentIndex, Estimator, PlanSynthesizer};
    use siteplan_test_utils::{ScriptedGenerator, warehouse_response};

    use super::AppState;

    const BOUNDARY: &str = "siteplan-test-boundary";

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    const DEFAULT_UPLOAD_LIMIT: usize = 50 * 1024 * 1024;

    fn state_with(llm: Arc<dyn TextGenerator>, request_timeout: Duration) -> AppState {
        let index = Arc::new(DocumentIndex::new());
        let synthesizer =
            PlanSynthesizer::new(llm, Estimator::default()).with_index(Arc::clone(&index));
        AppState {
            synthesizer: Arc::new(synthesizer),
            index,
            request_timeout,
            max_upload_bytes: DEFAULT_UPLOAD_LIMIT,
        }
    }

    fn scripted_state(response: &str) -> AppState {
        state_with(ScriptedGenerator::always(response), Duration::from_secs(5))
    }

    async fn send(state: AppState, request: Request<Body>) -> axum::response::Response {
        super::build_router(state).oneshot(request).await.unwrap()
    }

    async fn send_request(state: AppState, uri: &str) -> axum::response::Response {
        send(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_upload(field: &str, filename: &str, contents: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/ingest/document")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Never answers within any reasonable request timeout.
    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> String {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            String::new()
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_service_info() {
        let resp = send_request(scripted_state("[]"), "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["name"], "siteplan");
        assert_eq!(json["health"], "/health");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let resp = send_request(scripted_state("[]"), "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "siteplan");
    }

    #[tokio::test]
    async fn test_generate_plan() {
        let state = scripted_state(&warehouse_response());
        let resp = send(
            state,
            post_json(
                "/generate/plan",
                serde_json::json!({
                    "project_id": "WH-2025-001",
                    "location": "Seattle, WA",
                    "notes": "Work must not proceed during rain."
                }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "success");
        let plan = &json["plan"];
        assert_eq!(plan["project_id"], "WH-2025-001");
        assert_eq!(plan["tasks"].as_array().unwrap().len(), 6);
        assert_eq!(plan["total_duration_days"], 4029);
        assert_eq!(plan["critical_path"][0], "T-001");
        assert_eq!(plan["risks"][0]["risk_type"], "Weather");
    }

    #[tokio::test]
    async fn test_generate_plan_defaults_missing_fields() {
        let llm = ScriptedGenerator::always("[]");
        let state = state_with(llm.clone(), Duration::from_secs(5));
        let resp = send(state, post_json("/generate/plan", serde_json::json!({}))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["plan"]["project_id"], "Unknown");
        assert!(llm.last_prompt().unwrap().contains("Unknown"));
    }

    #[tokio::test]
    async fn test_generate_plan_with_garbage_output_falls_back() {
        let resp = send(
            scripted_state("I cannot help with that."),
            post_json("/generate/plan", serde_json::json!({"project_id": "P-1"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let tasks = json["plan"]["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["id"], "T-001");
        assert!(!json["plan"]["warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_plan_times_out() {
        let state = state_with(Arc::new(StalledGenerator), Duration::from_millis(50));
        let resp = send(
            state,
            post_json("/generate/plan", serde_json::json!({"project_id": "P-1"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("exceeded"));
    }

    #[tokio::test]
    async fn test_generate_plan_rejects_invalid_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/generate/plan")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = send(scripted_state("[]"), request).await;
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_ingest_then_search() {
        let state = scripted_state("[]");
        let resp = send(
            state.clone(),
            multipart_upload("file", "spec.pdf", b"definitely not a pdf"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["filename"], "spec.pdf");
        assert_eq!(json["doc_id"], "doc_0");
        assert_eq!(json["characters"], EXTRACTION_FAILED.chars().count());
        assert_eq!(state.index.len(), 1);

        let resp = send_request(state, "/documents/search?q=extraction&k=2").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["results"], serde_json::json!([EXTRACTION_FAILED]));
    }

    #[tokio::test]
    async fn test_ingest_without_file_field_is_bad_request() {
        let state = scripted_state("[]");
        let resp = send(
            state.clone(),
            multipart_upload("attachment", "spec.pdf", b"%PDF-1.4"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("file"));
        assert!(state.index.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_accepts_multi_megabyte_document() {
        let state = scripted_state("[]");
        let contents = vec![b'x'; 3 * 1024 * 1024];
        let resp = send(state.clone(), multipart_upload("file", "large.pdf", &contents)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["filename"], "large.pdf");
        assert_eq!(state.index.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_over_limit_is_payload_too_large() {
        let state = AppState {
            max_upload_bytes: 1024,
            ..scripted_state("[]")
        };
        let contents = vec![b'x'; 8 * 1024];
        let resp = send(state.clone(), multipart_upload("file", "big.pdf", &contents)).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(resp).await;
        assert!(json["error"].is_string());
        assert!(state.index.is_empty());
    }

    #[tokio::test]
    async fn test_bind_listener_accepts_host_names_and_literals() {
        for host in ["127.0.0.1", "localhost"] {
            let listener = super::bind_listener(host, 0).await.unwrap();
            let addr = listener.local_addr().unwrap();
            assert!(addr.ip().is_loopback(), "{host} bound to {addr}");
            assert_ne!(addr.port(), 0);
        }
    }

    #[tokio::test]
    async fn test_bind_listener_accepts_bare_ipv6_literal() {
        let addrs: Vec<_> = tokio::net::lookup_host(("::1", 8000)).await.unwrap().collect();
        assert_eq!(addrs, vec!["[::1]:8000".parse().unwrap()]);

        // Binding needs an IPv6 loopback, which some sandboxes lack.
        if let Ok(listener) = super::bind_listener("::1", 0).await {
            assert!(listener.local_addr().unwrap().is_ipv6());
        }
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let resp = send_request(scripted_state("[]"), "/documents/search?q=concrete").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["results"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_search_default_k() {
        let state = scripted_state("[]");
        for i in 0..7 {
            state.index.add(format!("doc{i}"), format!("concrete pour {i}"));
        }
        let resp = send_request(state, "/documents/search?q=concrete").await;
        let json = body_json(resp).await;
        assert_eq!(json["results"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let resp = send_request(scripted_state("[]"), "/documents/search").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_concurrent_plan_requests() {
        let state = scripted_state(&warehouse_response());
        let requests = (0..4).map(|i| {
            let state = state.clone();
            async move {
                let resp = send(
                    state,
                    post_json(
                        "/generate/plan",
                        serde_json::json!({"project_id": format!("P-{i}")}),
                    ),
                )
                .await;
                (i, body_json(resp).await)
            }
        });
        for (i, json) in join_spawned(requests).await {
            assert_eq!(json["plan"]["project_id"], format!("P-{i}"));
        }
    }

    async fn join_spawned<F, T>(futures: impl IntoIterator<Item = F>) -> Vec<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.await.unwrap());
        }
        out
    }
}

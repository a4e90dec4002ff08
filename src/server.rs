use crate::backend::BackendClient;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::logging::{LogLevel, SharedLogger};
use crate::providers::{self, GatewayTarget, Route};
use crate::proxy;
use crate::session::SessionTable;
use crate::translate::openai_types::{
    ChatCompletionRequest, CompletionRequest, ErrorResponse, HealthResponse, ModelList,
};
use crate::translate::streaming::{self, SseStream};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Utc;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    /// Shared HTTP client for gateway calls.
    pub client: reqwest::Client,
    pub backend: BackendClient,
    pub sessions: Arc<SessionTable>,
    pub logger: SharedLogger,
}

impl AppState {
    pub fn new(config: ProxyConfig, client: reqwest::Client, logger: SharedLogger) -> Self {
        let backend = BackendClient::new(
            client.clone(),
            config.backend.base_url.clone(),
            config.backend.default_provider_id.clone(),
        );
        Self {
            config,
            client,
            backend,
            sessions: Arc::new(SessionTable::new()),
            logger,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/completions", post(handle_completions))
        .route("/v1/embeddings", post(handle_embeddings))
        .route("/v1/files", get(handle_list_files).post(handle_upload_file))
        .route(
            "/v1/files/:file_id",
            get(handle_get_file).delete(handle_delete_file),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type HandlerResult = std::result::Result<Response, ProxyError>;

fn parse_body<T: DeserializeOwned>(body: &Bytes, logger: &SharedLogger) -> Result<T, ProxyError> {
    serde_json::from_slice(body).map_err(|e| {
        logger.error("server", format!("Failed to parse request: {}", e));
        ProxyError::validation(format!("Invalid request body: {}", e))
    })
}

fn sse_response(stream: SseStream) -> Response {
    let events = stream.map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

fn log_route(state: &AppState, endpoint: &str, route: &Route, streaming: bool) {
    state.logger.log_with_context(
        LogLevel::Info,
        "server",
        format!("Request: {endpoint} streaming={streaming}"),
        serde_json::json!({
            "provider": route.provider.to_string(),
            "model": route.model,
        }),
    );
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> HandlerResult {
    let req: ChatCompletionRequest = parse_body(&body, &state.logger)?;
    proxy::validate_chat(&req)?;

    let route = Route::select(&req.model, &state.config.routing.providers);
    log_route(&state, "chat/completions", &route, req.stream);

    if route.is_native() {
        if req.stream {
            let stream =
                proxy::chat_completion_stream(req, &state.backend, &state.sessions, &state.logger)
                    .await?;
            return Ok(sse_response(stream));
        }
        let resp =
            proxy::chat_completion(&req, &state.backend, &state.sessions, &state.logger).await?;
        return Ok(Json(resp).into_response());
    }

    if req.stream {
        // Credential problems must surface as an HTTP error, not in-band
        let target = GatewayTarget::resolve(&route, &state.config.routing)?;
        let client = state.client.clone();
        let logger = state.logger.clone();
        let stream = streaming::emulate(
            async move {
                let resp = providers::send_chat(&target, &route, &req, &client, &logger).await?;
                streaming::chat_frames(&resp)
            },
            state.logger.clone(),
        );
        return Ok(sse_response(stream));
    }

    let resp = providers::forward_chat(
        &route,
        &req,
        &state.config.routing,
        &state.client,
        &state.logger,
    )
    .await?;
    Ok(Json(resp).into_response())
}

async fn handle_completions(State(state): State<Arc<AppState>>, body: Bytes) -> HandlerResult {
    let req: CompletionRequest = parse_body(&body, &state.logger)?;
    proxy::validate_completion(&req)?;

    let route = Route::select(&req.model, &state.config.routing.providers);
    log_route(&state, "completions", &route, req.stream);

    if route.is_native() {
        if req.stream {
            let stream =
                proxy::legacy_completion_stream(req, &state.backend, &state.sessions, &state.logger)
                    .await?;
            return Ok(sse_response(stream));
        }
        let resp =
            proxy::legacy_completion(&req, &state.backend, &state.sessions, &state.logger)
                .await?;
        return Ok(Json(resp).into_response());
    }

    if req.stream {
        // Credential problems must surface as an HTTP error, not in-band
        let target = GatewayTarget::resolve(&route, &state.config.routing)?;
        let client = state.client.clone();
        let logger = state.logger.clone();
        let stream = streaming::emulate(
            async move {
                let resp = providers::send_completion(&target, &route, &req, &client, &logger).await?;
                streaming::legacy_frames(&resp)
            },
            state.logger.clone(),
        );
        return Ok(sse_response(stream));
    }

    let resp = providers::forward_completion(
        &route,
        &req,
        &state.config.routing,
        &state.client,
        &state.logger,
    )
    .await?;
    Ok(Json(resp).into_response())
}

async fn handle_embeddings() -> ProxyError {
    ProxyError::not_implemented(
        "embeddings_not_supported",
        "Embeddings are not supported by the OpenCode backend",
    )
}

async fn handle_upload_file() -> ProxyError {
    ProxyError::not_implemented(
        "file_upload_not_supported",
        "File upload is not supported; files come from the OpenCode workspace",
    )
}

async fn handle_delete_file() -> ProxyError {
    ProxyError::not_implemented(
        "file_delete_not_supported",
        "File deletion is not supported; files come from the OpenCode workspace",
    )
}

async fn handle_list_files(State(state): State<Arc<AppState>>) -> Response {
    Json(proxy::list_files(&state.backend, &state.logger).await).into_response()
}

async fn handle_get_file(Path(file_id): Path<String>) -> Response {
    Json(proxy::get_file(&file_id)).into_response()
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    match state.backend.list_models().await {
        Ok(data) => Json(ModelList {
            object: "list".to_string(),
            data,
        })
        .into_response(),
        Err(e) => {
            state.logger.error("server", format!("Model listing failed: {}", e));
            let err = ErrorResponse::new(
                format!("Failed to fetch models: {}", e),
                e.error_type(),
                "model_fetch_failed",
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

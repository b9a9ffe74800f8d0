//! REST API Server for the agent relay
//!
//! Exposes the chat agent via HTTP endpoints
//! Integrates with the frontend's line-delimited stream protocol

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::agent::AgentFactory;
use crate::config::Config;
use crate::models::ChatRequest;
use crate::translator;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub factory: Arc<AgentFactory>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

/// Validation failures answer with a plain `{"error": ...}` object and no
/// stream. Otherwise the agent run is streamed as protocol lines.
async fn chat_handler(State(state): State<ApiState>, body: Bytes) -> Response {
    debug!("Raw request body: {}", String::from_utf8_lossy(&body));

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Validation error: {}", e);
            return (
                StatusCode::OK,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let prompt = request.prompt_text();
    info!(
        history = request.conversation_history.len(),
        prompt_chars = prompt.chars().count(),
        "Received chat request"
    );

    let agent = state.factory.create_agent(&request.conversation_history);
    let events = agent.run_stream(prompt, false);
    let lines = translator::into_wire_lines(events).map(Ok::<_, Infallible>);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

/// =============================
/// Router
/// =============================

pub fn create_router(factory: Arc<AgentFactory>, config: &Config) -> Router {
    let state = ApiState { factory };

    let cors = match HeaderValue::from_str(&config.allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any),
        Err(e) => {
            warn!(origin = %config.allowed_origin, error = %e, "Invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    factory: Arc<AgentFactory>,
    config: Arc<Config>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(factory, &config);
    let address = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!("API Server listening on http://{}", address);
    info!("Local: http://127.0.0.1:{}", config.port);

    axum::serve(listener, router).await?;

    Ok(())
}

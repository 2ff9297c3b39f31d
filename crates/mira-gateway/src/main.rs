//! Mira TTS gateway — relays synthesis requests to the provider so the API
//! credential never reaches the client.
//!
//! `POST /api/tts {text, voice, format}` → audio bytes with an
//! `audio/<format>` content type and no-store cache headers. Upstream
//! failures are relayed with their status; blank text is rejected before any
//! upstream call.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_UPSTREAM: &str = "https://api.openai.com/v1/audio/speech";
const DEFAULT_MODEL: &str = "gpt-4o-mini-tts";

#[derive(Clone)]
struct AppState {
    api_key: String,
    upstream_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TtsRequest {
    #[serde(default)]
    text: String,
    #[serde(default = "default_voice")]
    voice: String,
    #[serde(default = "default_format")]
    format: String,
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_format() -> String {
    "mp3".to_string()
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| String::new());
    if api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; synthesis requests will fail with 500");
    }
    let upstream_url =
        std::env::var("MIRA_UPSTREAM_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM.to_string());
    let model = std::env::var("MIRA_TTS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .expect("reqwest client");

    let state = Arc::new(AppState {
        api_key,
        upstream_url,
        model,
        client,
    });

    let app = router(state);
    let addr = std::env::var("MIRA_GATEWAY_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    info!("mira gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tts", post(tts_handler))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn tts_handler(State(state): State<Arc<AppState>>, Json(req): Json<TtsRequest>) -> Response {
    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "text required" })),
        )
            .into_response();
    }
    if state.api_key.is_empty() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "missing OPENAI_API_KEY on server" })),
        )
            .into_response();
    }

    // text/voice/format pass through unmodified; only the model and the
    // credential are added here.
    let body = serde_json::json!({
        "model": state.model,
        "voice": req.voice,
        "input": req.text,
        "format": req.format,
    });
    let upstream = match state
        .client
        .post(&state.upstream_url)
        .bearer_auth(&state.api_key)
        .json(&body)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("upstream request failed: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "upstream unreachable" })),
            )
                .into_response();
        }
    };

    let status = upstream.status();
    if !status.is_success() {
        let message = upstream.text().await.unwrap_or_default();
        warn!("upstream synthesis error {}: {}", status, message);
        let relayed = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return (relayed, message).into_response();
    }

    let bytes = match upstream.bytes().await {
        Ok(b) => b,
        Err(e) => {
            warn!("upstream body read failed: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "upstream body read failed" })),
            )
                .into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format!("audio/{}", req.format)),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, max-age=0".to_string(),
            ),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ],
        bytes.to_vec(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_key(api_key: &str) -> Arc<AppState> {
        Arc::new(AppState {
            api_key: api_key.to_string(),
            upstream_url: DEFAULT_UPSTREAM.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    fn request(text: &str) -> TtsRequest {
        TtsRequest {
            text: text.to_string(),
            voice: default_voice(),
            format: default_format(),
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_upstream_call() {
        let res = tts_handler(State(state_with_key("sk-test")), Json(request("   "))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_credential_is_a_server_error() {
        let res = tts_handler(State(state_with_key("")), Json(request("hello"))).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let res = health().await.into_response();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn request_defaults_fill_voice_and_format() {
        let req: TtsRequest = serde_json::from_str(r#"{ "text": "hi" }"#).unwrap();
        assert_eq!(req.voice, "alloy");
        assert_eq!(req.format, "mp3");
    }
}

// novin/src/bin/bridge.rs
//
// novin-bridge — thin HTTP face over the SDK.
//
//   GET  /health  → {"status":"ok"}
//   POST /assess  → assessment JSON (400 empty body, 404 unknown route,
//                   429 rate limited, 500 internal)
//
// Bind address via NOVIN_BIND_HOST (default 127.0.0.1) and NOVIN_BIND_PORT
// (default 8088).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use novin::{NovinSdk, SdkConfig, SdkError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("novin=info".parse().expect("static directive")),
        )
        .compact()
        .init();

    let sdk = match NovinSdk::initialize(SdkConfig::default()) {
        Ok(sdk) => sdk,
        Err(e) => {
            eprintln!("initialization failed: {e}");
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/assess", post(assess))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .with_state(sdk);

    let host = std::env::var("NOVIN_BIND_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port = std::env::var("NOVIN_BIND_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8088);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("novin-bridge listening on {host}:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn assess(State(sdk): State<NovinSdk>, body: String) -> Response {
    if body.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_input", "detail": "empty body"})),
        )
            .into_response();
    }

    match sdk.assess(body).await {
        Ok(assessment) => Json(assessment).into_response(),
        Err(e) => {
            let status = match &e {
                SdkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                SdkError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({"error": e.code(), "detail": e.to_string()}))).into_response()
        }
    }
}

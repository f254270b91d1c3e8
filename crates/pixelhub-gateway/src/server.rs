//! Axum HTTP/WebSocket server.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::connection::ws_handler;
use crate::selections;
use crate::state::GatewayState;

/// Build the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/place.png", get(image_handler))
        .route("/stat", get(stat_handler))
        .route("/health", get(health_handler))
        .route(
            "/selections",
            get(selections::get_handler)
                .post(selections::post_handler)
                .delete(selections::delete_handler),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the gateway server.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr();
    let app = router(state);

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn image_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let snapshot = state.canvas.lock().await.snapshot();
    match snapshot {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-cache, no-store"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(%e, "failed to encode canvas snapshot");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn stat_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (connections, slots) = state.hub.stats().await.unwrap_or((0, 0));
    axum::Json(json!({
        "connections": connections,
        "slots": slots,
    }))
}

async fn health_handler() -> impl IntoResponse {
    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}

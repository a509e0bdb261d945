//! HTTP server wiring

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use clickrank_identity::IdentityVerifier;
use clickrank_runtime::Runtime;
use clickrank_store::ScoreStore;

use crate::{admin, ws, GatewayArgs};

/// Shared handler state
pub struct AppState<V, S> {
    pub runtime: Arc<Runtime<V, S>>,
}

impl<V, S> Clone for AppState<V, S> {
    fn clone(&self) -> Self {
        AppState {
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// CORS policy for the configured origins. `*` anywhere allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Build the router
pub fn router<V: IdentityVerifier, S: ScoreStore>(
    runtime: Arc<Runtime<V, S>>,
    allowed_origins: &[String],
) -> Router {
    Router::new()
        .route("/ws", get(ws::upgrade::<V, S>))
        .route("/users", post(admin::create_user::<V, S>))
        .route("/health", get(health::<V, S>))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { runtime })
}

/// GET /health
async fn health<V: IdentityVerifier, S: ScoreStore>(State(state): State<AppState<V, S>>) -> Json<Value> {
    let stats = state.runtime.stats();
    Json(json!({
        "connections": stats.connections,
        "counter": stats.counter,
    }))
}

/// Bind and serve until Ctrl-C
pub async fn serve<V: IdentityVerifier, S: ScoreStore>(
    runtime: Arc<Runtime<V, S>>,
    args: &GatewayArgs,
) -> anyhow::Result<()> {
    let app = router(runtime, &args.allowed_origins);
    let listener = TcpListener::bind(args.addr()).await?;
    info!(
        "Clickrank gateway listening on {} (origins: {})",
        listener.local_addr()?,
        args.allowed_origins.join(", ")
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Clickrank gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

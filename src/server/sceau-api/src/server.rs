//! API server setup.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::create_router;
use crate::state::{ApiConfig, AppState};

/// Router with tracing and optional CORS layers.
pub fn build_app(state: AppState, config: &ApiConfig) -> Router {
    let mut router = create_router(state).layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Serves the app on `addr` from a background task (port 0 picks a free one).
///
/// Returns the bound address.
pub async fn start_background_server(
    state: AppState,
    config: &ApiConfig,
    addr: SocketAddr,
) -> std::io::Result<SocketAddr> {
    let app = build_app(state, config);

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

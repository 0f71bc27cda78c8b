use crate::server::{routes, websocket};
use crate::state::FeedState;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build the Axum application
pub fn build_app(state: FeedState) -> Router {
    // Local origins only unless explicitly opened up.
    let cors = if state.config.allow_any_origin {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([
                HeaderValue::from_static("http://localhost:5173"),
                HeaderValue::from_static("http://127.0.0.1:5173"),
            ]))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        // Snapshot
        .route("/events", get(routes::list_events))
        // Sales
        .route("/sales/start", post(routes::start_sales))
        .route("/sales/stop", post(routes::stop_sales))
        .route("/sales/status", get(routes::sales_status))
        .route("/sales/purchase", post(routes::purchase))
        // Push control
        .route("/push/disconnect", post(routes::disconnect_push));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(websocket::websocket_handler))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::render_metrics))
        .layer(cors)
        .with_state(state)
}

/// Run the feed server until the shutdown future resolves
pub async fn run_server(
    state: FeedState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_app(state);

    tracing::info!("Starting ticket feed on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

//! HTTP Server
//!
//! axum surface over [`SyncService`]: the session API, the publish endpoint
//! and the `/events` push stream. Every request carries a [`ClientId`]
//! assigned by the identity middleware.
//!
//! [`ClientId`]: crate::types::ClientId

pub mod error;
pub mod events;
pub mod identity;
pub mod routes;

use crate::config::{MirrorcastConfig, ServerConfig};
use crate::error::ApiError;
use crate::service::SyncService;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use identity::CLIENT_COOKIE;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
}

/// Build the router for `service`.
pub fn router(service: Arc<SyncService>, config: &ServerConfig) -> Router {
    let state = AppState { service };

    Router::new()
        .route(
            "/api/sessions",
            get(routes::list_sessions).post(routes::create_session),
        )
        .route("/api/sessions/join", post(routes::join_session))
        .route("/api/sessions/claim", post(routes::claim_session))
        .route("/api/sessions/current", get(routes::current_session))
        .route("/api/sessions/leave", post(routes::leave_session))
        .route("/sync/update", post(routes::publish_update))
        .route("/sync/stats", get(routes::session_stats))
        .route("/events", get(events::event_stream))
        .route("/health", get(routes::health))
        .layer(middleware::from_fn(identity::assign_identity))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: &MirrorcastConfig) -> Result<(), ApiError> {
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    let service = Arc::new(SyncService::with_limits(
        config.limits.clone(),
        config.server.subscriber_buffer,
    ));
    info!(%addr, "Mirrorcast server listening");
    serve_on(listener, service, &config.server, ctrl_c()).await
}

/// Serve on an already bound listener until `shutdown` resolves. Every
/// session is closed before the listener drains, which ends open event
/// streams.
pub async fn serve_on<F>(
    listener: TcpListener,
    service: Arc<SyncService>,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(service.clone(), config);
    let on_shutdown = async move {
        shutdown.await;
        service.shutdown();
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(on_shutdown)
        .await?;
    info!("Mirrorcast server stopped");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C; shutting down");
    }
}

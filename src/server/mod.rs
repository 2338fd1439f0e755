//! HTTP surface
//!
//! Routes:
//! - `POST /download` - fetch a URL as mp4 or mp3 and stream the file back
//! - `GET /info` - metadata for a URL without downloading
//! - `GET /formats` - muxed formats available for a URL
//! - `GET /` - endpoint index

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use crate::acquisition::{MediaAcquirer, YtDlpAcquirer};
use crate::config::Config;
use crate::staging::StagingArea;
use crate::Result;

/// Build the router around an acquirer
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/download", post(routes::download))
        .route("/info", get(routes::info))
        .route("/formats", get(routes::formats))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(build_cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Build a CORS layer based on configured origins.
///
/// Credentials are never allowed: the API uses no cookies, and tower-http
/// rejects credentials together with a wildcard origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST];

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

/// Prepare the staging directory, bind the listener and serve until shutdown
pub async fn start_server(config: Config) -> Result<()> {
    let staging = StagingArea::new(&config.staging.dir);
    staging.ensure()?;

    let acquirer: Arc<dyn MediaAcquirer> =
        Arc::new(YtDlpAcquirer::from_config(&config.acquisition, staging));
    let state = AppState::new(acquirer, config.acquisition.max_concurrent_jobs);
    let app = create_router(state, &config.server.cors_origins);

    let bind_address = config.bind_address()?;
    let listener = TcpListener::bind(bind_address).await?;

    tracing::info!(
        address = %bind_address,
        staging = %config.staging.dir.display(),
        max_concurrent_jobs = config.acquisition.max_concurrent_jobs,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::handlers::{
    delete_link, generate_link, issue_captcha, ping, redirect, stats_link, AppState,
};
use crate::middleware::{rate_limit, request_logger, session_layer};

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let state = AppState::new(config)?;
        Ok(Self { state })
    }

    pub async fn run(self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let addr = self.state.config.listen_addr;
        let app = create_app(self.state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("listening and serving HTTP on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

/// Assembles the router.
///
/// The rate-limit gate is a route layer: only matched routes consume
/// tokens, so unrouted paths (static assets served by the fallback in a
/// full deployment) bypass it.
pub fn create_app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/ping", get(ping))
        .route("/s/:hash", get(redirect))
        .route("/api/captcha", get(issue_captcha))
        .route("/api/generate_link", post(generate_link))
        .route("/api/stats_link", post(stats_link))
        .route("/api/delete_link", post(delete_link));

    if state.config.limiter_enabled {
        router = router.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logger))
                .layer(middleware::from_fn_with_state(state.clone(), session_layer)),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, initiating graceful shutdown");
        },
    }
}

//! # Gaming leaderboard service
//!
//! Accepts score submissions from many concurrent clients, keeps a
//! running total per player, and serves a globally consistent ranking by
//! top-N listing or per-player lookup.
//!
//!
//!
//! # Write path
//!
//! - Submission validates the delta, then applies it atomically under the
//!   player's row lock, so same-player submissions never lose an update
//! - The committed submission invalidates the submitter's cached rank and
//!   schedules a full rank recomputation in the background
//! - Recomputation serializes behind a single lock, rewrites every rank
//!   in one pass, then drops the listing and rank caches
//!
//! Rank is eventually consistent by design: between a committed total and
//! the next completed recomputation, ranks may be stale. Totals are never
//! stale for the submitter.
//!
//!
//!
//! # Read path
//!
//! Top-N listings and per-player lookups go through bounded TTL caches;
//! a miss queries the store and repopulates. Clients poll; there is no
//! push feed.
//!
//!
//!
//! # Surface
//!
//! - `POST /leaderboard/submit`
//! - `GET /leaderboard/top?limit=10&page=1`
//! - `GET /leaderboard/rank/{player_id}`
//! - `GET /health`

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod rank;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod store;
pub mod submission;

use config::Config;
use routes::{health_handler, rank_handler, root_handler, submit_handler, top_handler};
use state::State;

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/leaderboard/submit", post(submit_handler))
        .route("/leaderboard/top", get(top_handler))
        .route("/leaderboard/rank/{player_id}", get(rank_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new(Config::load());

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    spawn_limiter_sweep(state.clone());

    let app = router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

/// Periodically drop expired rate-limit windows so the counter maps stay
/// bounded by active clients, not clients ever seen.
fn spawn_limiter_sweep(state: Arc<State>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            state.submit_limiter.sweep();
            state.top_limiter.sweep();
            state.rank_limiter.sweep();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Documentation of the Bigfoot Tracker API.
//!
//! Stores and queries cryptid sightings in Redis. Seed data comes from the
//! `process` converter, which turns the BFRO CSV export into JSON documents.
//!
//!
//!
//! # Storage
//!
//! - Sightings are RedisJSON documents under `bigfoot:sighting:<id>`
//! - Ids are UUIDv7, unique and sortable by creation time
//! - Membership sets (all, by state, by class) answer tag lookups, see [`index`]
//! - A search index over the documents answers pages, text, numeric and
//!   radius queries, see [`search`]
//! - `location` is kept as a `"lon,lat"` string since that is what GEO fields
//!   index
//!
//!
//!
//! # Writes
//!
//! - `PUT` replaces the whole document. Two replaces of one id race freely,
//!   last writer wins
//! - `PATCH` watches the document and commits every field write at once. A
//!   concurrent change rejects the patch with `409 CONFLICT`, see [`patch`]
//! - Membership set updates never undo a saved document. If they fail, the
//!   response says `DEGRADED` instead of `OK`
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/status` | name, version, Redis ping |
//! | GET, PUT, DELETE | `/motd` | message of the day, optional `expireIn` seconds |
//! | POST, GET, PATCH | `/report` | push, list, pop the report queue |
//! | POST | `/sightings` | create, returns `{ id }` |
//! | GET, PUT, PATCH, DELETE | `/sightings/{id}` | one sighting |
//! | GET | `/sightings` | everything |
//! | GET | `/sightings/page/{n}?size=` | 1-based pages |
//! | GET | `/sightings/by-state/{state}` | |
//! | GET | `/sightings/by-class/{class}` | |
//! | GET | `/sightings/by-state/{state}/and-class/{class}` | |
//! | GET | `/sightings/containing/{word}` | title or narrative |
//! | GET | `/sightings/above-temperature/{t}` | mid temperature at or above `t` |
//! | GET | `/sightings/within/{radius}/miles-of/{lon},{lat}` | |
//!
//!
//!
//! # Setup
//!
//! Needs a Redis with the JSON and search modules, e.g. Redis Stack.
//! ```sh
//! docker run -p 6379:6379 redis/redis-stack:latest
//! ```
//!
//! Environment: `SERVER_PORT`, `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`
//! (or `/run/secrets/REDIS_PASSWORD`), `PAGE_SIZE`. Logging via `RUST_LOG`.
//! ```sh
//! RUST_LOG=info cargo run -p bigfoot
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod keys;
pub mod patch;
pub mod routes;
pub mod search;
pub mod sightings;
pub mod state;
pub mod store;
pub mod utils;

#[cfg(test)]
mod memory;

use routes::*;
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("👣 Bigfoot Tracker API ready at {address} 👣");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/status", get(status_handler))
        .route(
            "/motd",
            get(get_motd_handler)
                .put(put_motd_handler)
                .delete(delete_motd_handler),
        )
        .route(
            "/report",
            get(get_reports_handler)
                .post(post_report_handler)
                .patch(pop_report_handler),
        )
        .route(
            "/sightings",
            get(all_sightings_handler).post(create_sighting_handler),
        )
        .route(
            "/sightings/{id}",
            get(get_sighting_handler)
                .put(put_sighting_handler)
                .patch(patch_sighting_handler)
                .delete(delete_sighting_handler),
        )
        .route("/sightings/page/{page}", get(page_handler))
        .route("/sightings/by-state/{state}", get(by_state_handler))
        .route("/sightings/by-class/{class}", get(by_class_handler))
        .route(
            "/sightings/by-state/{state}/and-class/{class}",
            get(by_state_and_class_handler),
        )
        .route("/sightings/containing/{word}", get(containing_handler))
        .route(
            "/sightings/above-temperature/{temperature}",
            get(above_temperature_handler),
        )
        .route(
            "/sightings/within/{radius}/miles-of/{coordinates}",
            get(within_handler),
        )
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

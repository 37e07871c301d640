use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod config;
mod db;
mod error;
mod handlers;
mod models;

use crate::config::Config;
use crate::db::{ItemStore, PgItemStore};

/// Shared application state; the store is built once in `main` and injected.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,item_service=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    // One connection, opened on the first query and kept for the process lifetime.
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy_with(config.database.connect_options()?);
    info!(
        db_host = %config.database.host,
        db_name = %config.database.name,
        from_url = config.database.url.is_some(),
        "Database pool configured (connects on first use)"
    );

    let state = AppState {
        store: Arc::new(PgItemStore::new(pool)),
    };

    let app = build_router(state, config.cors_enabled);

    let addr = config.bind_addr();
    info!(cors = config.cors_enabled, "Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState, cors_enabled: bool) -> Router {
    let router = Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Items CRUD ──────────────────────────────────────────────────────
        .route(
            "/items",
            get(handlers::items::list_items).post(handlers::items::create_item),
        )
        .route(
            "/items/:id",
            get(handlers::items::get_item)
                .put(handlers::items::update_item)
                .delete(handlers::items::delete_item),
        )
        .fallback(not_found);

    // ── Middleware ──────────────────────────────────────────────────────────
    let router = if cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Any origin; OPTIONS on every path is answered here with an empty 200.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::AUTHORIZATION,
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

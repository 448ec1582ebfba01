pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod media;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;
pub mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::media::cloudinary::CloudinaryStore;
use crate::media::{DisabledStore, MediaStore};
use crate::rate_limit::LoginRateLimiter;
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> (Router, SharedState) {
    let media: Arc<dyn MediaStore> = match config.cloudinary.clone() {
        Some(cloudinary) => match CloudinaryStore::new(cloudinary) {
            Ok(store) => {
                tracing::info!("Cloudinary media storage configured");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!("Cloudinary not available: {e}");
                Arc::new(DisabledStore)
            }
        },
        None => {
            tracing::warn!("Cloudinary credentials not set, file uploads are disabled");
            Arc::new(DisabledStore)
        }
    };

    build_app_with_media(pool, config, media)
}

pub fn build_app_with_media(
    pool: PgPool,
    config: Config,
    media: Arc<dyn MediaStore>,
) -> (Router, SharedState) {
    let cors = cors_layer(&config.client_urls);
    let body_limit = DefaultBodyLimit::max(config.max_body_size);

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        media,
        login_limiter: LoginRateLimiter::default(),
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(body_limit)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Credentialed CORS for the configured front-end origins.
fn cors_layer(client_urls: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = client_urls
        .iter()
        .filter_map(|url| match HeaderValue::from_str(url) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid client origin: {url}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> &'static str {
    "ok"
}

//! # api-adapters
//!
//! The HTTP surface of Rovel: a JSON API over `services::AppContext`, the
//! ad-gated chapter reader, request metrics and the static frontend.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;

pub use metrics::HttpMetrics;

#[cfg(feature = "web-axum")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "web-axum")]
pub use handlers::ApiState;

#[cfg(feature = "web-axum")]
mod routes {
    use std::path::Path;
    use std::sync::Arc;

    use axum::routing::{delete, get, post};
    use axum::Router;
    use tower_http::services::{ServeDir, ServeFile};
    use tower_http::trace::TraceLayer;

    use crate::handlers::{self, ApiState};
    use crate::middleware::{cors_policy, track_requests};

    /// Builds the full application. With a `static_dir`, `/` serves
    /// `index.html`, `/admin` serves `admin.html` and unknown paths fall back
    /// to files under the directory.
    pub fn router(state: ApiState, static_dir: Option<&Path>) -> Router {
        let mut app = Router::new()
            .route("/api/data", get(handlers::list_works))
            .route(
                "/api/manga",
                get(handlers::list_works).post(handlers::create_work),
            )
            .route(
                "/api/manga/{id}",
                get(handlers::get_work)
                    .put(handlers::update_work)
                    .delete(handlers::delete_work),
            )
            .route(
                "/api/manga/{id}/chapters",
                get(handlers::list_chapters).post(handlers::upsert_chapter),
            )
            .route(
                "/api/manga/{id}/chapters/{chapter_id}",
                delete(handlers::delete_chapter),
            )
            .route(
                "/api/ads-config",
                get(handlers::get_ads_config).post(handlers::update_ads_config),
            )
            .route("/api/guest-user", post(handlers::register_guest))
            .route("/api/users", get(handlers::list_users))
            .route("/api/users/{id}", delete(handlers::delete_user))
            .route("/ads-complete", post(handlers::ads_complete))
            .route(
                "/chapter/{work_key}/{chapter_id}",
                get(handlers::read_chapter),
            )
            .route(
                "/direct-chapter/{work_key}/{chapter_id}",
                get(handlers::read_chapter_direct),
            )
            .route("/metrics", get(handlers::metrics))
            .route_layer(axum::middleware::from_fn_with_state(
                Arc::clone(&state.metrics),
                track_requests,
            ));

        if let Some(dir) = static_dir {
            app = app
                .route_service("/", ServeFile::new(dir.join("index.html")))
                .route_service("/admin", ServeFile::new(dir.join("admin.html")))
                .fallback_service(ServeDir::new(dir));
        }

        app.layer(cors_policy())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[cfg(feature = "web-axum")]
pub use routes::router;

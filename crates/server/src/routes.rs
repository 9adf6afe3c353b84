//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Room for the manifest, readme and multipart framing on top of the artifact.
const PUBLISH_BODY_OVERHEAD: usize = 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let publish_limit = usize::try_from(state.config.server.max_artifact_size)
        .unwrap_or(usize::MAX)
        .saturating_add(PUBLISH_BODY_OVERHEAD);

    let api_routes = Router::new()
        // Service info
        .route("/v1", get(handlers::get_info))
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Accounts
        .route("/v1/register", post(handlers::register))
        .route("/v1/verify", post(handlers::verify))
        .route("/v1/login", post(handlers::login))
        .route("/v1/user", get(handlers::get_self))
        .route("/v1/user/{name}", get(handlers::get_user))
        // Search
        .route("/v1/search/package", get(handlers::search_packages))
        .route("/v1/search/user", get(handlers::search_users))
        // Packages
        .route(
            "/v1/package/{name}",
            get(handlers::get_package)
                .post(handlers::publish)
                .layer(DefaultBodyLimit::max(publish_limit))
                .delete(handlers::delete_package),
        )
        .route(
            "/v1/package/{name}/{version}",
            get(handlers::get_artifact).delete(handlers::unpublish),
        )
        .route(
            "/v1/package/{name}/tag/{tag}",
            post(handlers::set_tag).delete(handlers::remove_tag),
        )
        .route(
            "/v1/package/{name}/author/{user}",
            post(handlers::add_author).delete(handlers::remove_author),
        );

    let cdn_routes = Router::new()
        .route("/cdn", get(handlers::cdn_index))
        .route("/cdn/{name}", get(handlers::cdn_latest))
        .route("/cdn/{name}/{version}", get(handlers::cdn_version));

    let mut router = Router::new().merge(api_routes).merge(cdn_routes);

    // Conditionally add metrics endpoint based on config.
    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    // Order of execution: TraceLayer -> Auth -> Handler
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

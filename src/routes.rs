// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{post as post_handlers, upload, user},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Posts: CRUD plus render-on-read sanitization.
/// * Upload: rate-limited multipart endpoint, published under /uploads.
/// * Users: profile create/fetch/settings update.
/// * Applies global middleware (Trace, CORS) and injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(5)
        .finish()
        .unwrap();
    let governor_conf = Arc::new(governor_conf);

    let post_routes = Router::new()
        .route(
            "/",
            get(post_handlers::list_posts).post(post_handlers::create_post),
        )
        .route(
            "/{id}",
            get(post_handlers::get_post)
                .put(post_handlers::update_post)
                .delete(post_handlers::delete_post),
        );

    let user_routes = Router::new()
        .route("/", post(user::create_profile))
        .route("/{id}", get(user::get_profile).put(user::update_profile));

    // Multipart bodies carry boundary overhead on top of the file itself.
    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(2);

    let upload_routes = Router::new()
        .route("/api/upload", post(upload::upload_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(GovernorLayer::new(governor_conf));

    Router::new()
        .nest("/api/posts", post_routes)
        .nest("/api/users", user_routes)
        .merge(upload_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

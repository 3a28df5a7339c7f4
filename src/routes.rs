use axum::{
    routing::{get, post},
    Router,
    extract::DefaultBodyLimit,
};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use crate::{config::Config, handlers, services::UserStore};

/// Builds the API router over `store`.
pub fn build_router(store: UserStore, config: Config) -> Router {
    let max_body_size = config.server.max_body_size;

    Router::new()
        // Account routes
        .route("/register", post(handlers::handle_register))
        .route("/login", post(handlers::handle_login))

        // Credit routes
        .route("/admin/add-credit", post(handlers::add_credit))
        .route("/user/:username/credit", get(handlers::check_credit))

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_size)),
        )
        .with_state((store, config))
}

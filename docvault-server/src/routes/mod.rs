use crate::middleware::require_session;
use crate::state::AppState;
use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

mod auth;
mod files;
mod health;

pub fn router(state: AppState) -> Router {
    let upload_limit = RequestBodyLimitLayer::new(state.config.max_upload_bytes);

    let protected = Router::new()
        .route("/me", get(auth::me))
        .route("/files", get(files::list_files).post(files::create_file))
        .route(
            "/files/{id}",
            get(files::get_file).delete(files::delete_file),
        )
        .route(
            "/files/{id}/content",
            get(files::download_content)
                .put(files::upload_content)
                .layer(upload_limit),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.limits.max_upload_size as usize;

    let mut router = Router::new()
        // Hierarchy
        .route(
            "/objects",
            get(handlers::list_objects).delete(handlers::delete_object),
        )
        .route("/folders", post(handlers::create_folder))
        .route("/rename", put(handlers::rename_object))
        .route("/search", get(handlers::search))
        // Capabilities
        .route("/file", get(handlers::download_url))
        .route("/upload", get(handlers::upload_url))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Locally-signed capability URLs resolve here
    if state.signer.is_some() {
        router = router.route(
            "/blob/*key",
            get(handlers::get_blob)
                .put(handlers::put_blob)
                .layer(DefaultBodyLimit::max(upload_limit)),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, Config};
use crate::handlers::{
    create_event, delete_event, get_event, health_check, list_events, update_event,
};
use crate::state::AppState;
use crate::storage::images::UPLOADS_ROUTE;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let mut router = Router::new()
        .route("/", get(list_events))
        .route("/health", get(health_check))
        .route("/getEvent/:id", get(get_event))
        .route("/createEvent", post(create_event))
        .route("/updateEvent/:id", put(update_event))
        .route("/deleteEvent/:id", delete(delete_event))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    if let Some(dir) = config.local_upload_dir() {
        router = router.nest_service(UPLOADS_ROUTE, ServeDir::new(dir));
    }

    apply_security_headers(router, config.production)
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(&config.cors_allowed_origins))
}

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::response::success;

pub mod base_url;
pub mod events;
pub mod form;

pub use events::{create_event, delete_event, get_event, list_events, update_event};

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "event-crud-api",
    };

    success(payload).into_response()
}

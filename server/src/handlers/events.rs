use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};

use crate::handlers::base_url::BaseUrl;
use crate::handlers::form::read_event_form;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, message, success};

/// GET / - List all events
pub async fn list_events(
    State(state): State<AppState>,
    BaseUrl(base_url): BaseUrl,
) -> Result<Response, AppError> {
    let events = state.events.list(&base_url).await?;
    Ok(success(events).into_response())
}

/// GET /getEvent/:id
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    BaseUrl(base_url): BaseUrl,
) -> Result<Response, AppError> {
    let event = state.events.get(&id, &base_url).await?;
    Ok(success(event).into_response())
}

/// POST /createEvent - responds with the event as stored
pub async fn create_event(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let form = read_event_form(multipart).await?;
    let event = state.events.create(form.input, form.image).await?;
    Ok(created(event).into_response())
}

/// PUT /updateEvent/:id
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    BaseUrl(base_url): BaseUrl,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let form = read_event_form(multipart).await?;
    let event = state
        .events
        .update(&id, form.input, form.image, &base_url)
        .await?;
    Ok(success(event).into_response())
}

/// DELETE /deleteEvent/:id
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    state.events.delete(&id).await?;
    Ok(message("Event deleted successfully").into_response())
}

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::models::EventInput;
use crate::storage::images::ImageUpload;
use crate::utils::error::AppError;

pub const NAME_FIELD: &str = "eventname";
pub const PLACE_FIELD: &str = "eventplace";
pub const DATE_FIELD: &str = "eventdate";
pub const IMAGE_FIELD: &str = "image";

/// Create/update form as submitted by the client.
#[derive(Debug, Default)]
pub struct EventForm {
    pub input: EventInput,
    pub image: Option<ImageUpload>,
}

/// Reads the multipart body. Unknown parts are ignored; an image part
/// without a file name or content counts as no image. A body that is not
/// multipart at all is reported as a validation error.
pub async fn read_event_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<EventForm, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        AppError::ValidationError(format!("Invalid multipart body: {}", rejection.body_text()))
    })?;
    let mut form = EventForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            NAME_FIELD => form.input.name = Some(field.text().await.map_err(multipart_error)?),
            PLACE_FIELD => form.input.place = Some(field.text().await.map_err(multipart_error)?),
            DATE_FIELD => form.input.date = Some(field.text().await.map_err(multipart_error)?),
            IMAGE_FIELD => form.image = read_image(field).await?,
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

async fn read_image(field: Field<'_>) -> Result<Option<ImageUpload>, AppError> {
    let file_name = field.file_name().map(str::to_string).unwrap_or_default();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if file_name.is_empty() || bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(ImageUpload {
        file_name,
        content_type,
        bytes,
    }))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Uploaded file is too large".to_string())
    } else {
        AppError::ValidationError(format!("Invalid multipart body: {}", err.body_text()))
    }
}

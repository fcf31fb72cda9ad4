use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::date::{format_event_date, to_storage};
use crate::models::{Event, EventChanges, EventInput, EventView, NewEvent};
use crate::storage::images::{ImageStore, ImageUpload};
use crate::storage::EventStore;
use crate::utils::error::AppError;

/// Orchestrates event CRUD over an [`EventStore`] and an [`ImageStore`].
#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventStore>,
    images: Arc<dyn ImageStore>,
}

impl EventService {
    pub fn new(events: Arc<dyn EventStore>, images: Arc<dyn ImageStore>) -> Self {
        Self { events, images }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, base_url: &str) -> Result<Vec<EventView>, AppError> {
        let events = self.events.list().await?;
        Ok(events
            .into_iter()
            .map(|event| self.present(event, base_url))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str, base_url: &str) -> Result<EventView, AppError> {
        let id = parse_id(id)?;
        let event = self.events.get(id).await?.ok_or_else(|| not_found(id))?;
        Ok(self.present(event, base_url))
    }

    /// Stores the image first so no record ever points at a missing file.
    #[instrument(skip(self, image), fields(has_image = image.is_some()))]
    pub async fn create(
        &self,
        input: EventInput,
        image: Option<ImageUpload>,
    ) -> Result<Event, AppError> {
        let valid = input.validate()?;

        let image = match image {
            Some(upload) => Some(self.images.store(upload).await?),
            None => None,
        };

        let new_event = NewEvent {
            name: valid.name,
            place: valid.place,
            date: to_storage(valid.date),
            image: image.clone(),
        };

        match self.events.insert(new_event).await {
            Ok(event) => {
                info!(id = %event.id, "Created event");
                Ok(event)
            }
            Err(e) => {
                if let Some(reference) = image {
                    self.discard_image(&reference, "event insert failed").await;
                }
                Err(e.into())
            }
        }
    }

    /// Replaces the text fields and, when a new upload is given, the image.
    #[instrument(skip(self, image), fields(has_image = image.is_some()))]
    pub async fn update(
        &self,
        id: &str,
        input: EventInput,
        image: Option<ImageUpload>,
        base_url: &str,
    ) -> Result<EventView, AppError> {
        let valid = input.validate()?;
        let id = parse_id(id)?;
        if self.events.get(id).await?.is_none() {
            return Err(not_found(id));
        }

        let new_image = match image {
            Some(upload) => Some(self.images.store(upload).await?),
            None => None,
        };

        let changes = EventChanges {
            name: valid.name,
            place: valid.place,
            date: to_storage(valid.date),
            image: new_image.clone(),
        };

        let updated = match self.events.update(id, changes).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                if let Some(reference) = &new_image {
                    self.discard_image(reference, "event vanished during update").await;
                }
                return Err(not_found(id));
            }
            Err(e) => {
                if let Some(reference) = &new_image {
                    self.discard_image(reference, "event update failed").await;
                }
                return Err(e.into());
            }
        };

        // Release only the reference this write replaced, as read under the row lock.
        if let (Some(new), Some(old)) = (&new_image, &updated.previous_image) {
            if new != old {
                self.discard_image(old, "image replaced").await;
            }
        }

        info!(id = %updated.event.id, "Updated event");
        Ok(self.present(updated.event, base_url))
    }

    /// Deletes the record, then makes a best-effort attempt to release its
    /// image.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let id = parse_id(id)?;
        let removed = self.events.delete(id).await?.ok_or_else(|| not_found(id))?;

        if let Some(reference) = &removed.image {
            self.discard_image(reference, "event deleted").await;
        }

        info!(%id, "Deleted event");
        Ok(())
    }

    fn present(&self, event: Event, base_url: &str) -> EventView {
        EventView {
            id: event.id,
            date: format_event_date(&event.date),
            image: event
                .image
                .as_deref()
                .map(|reference| self.images.resolve(reference, base_url)),
            name: event.name,
            place: event.place,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }

    async fn discard_image(&self, reference: &str, reason: &'static str) {
        if let Err(e) = self.images.delete(reference).await {
            warn!(%reference, reason, error = %e, "Failed to delete stored image");
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id.trim())
        .map_err(|_| AppError::NotFound(format!("Event with id '{}' was not found", id)))
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Event with id '{}' was not found", id))
}

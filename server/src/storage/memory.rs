use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent, UpdatedEvent};
use crate::storage::{EventStore, StoreResult};

/// Process-local event store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(&self) -> StoreResult<Vec<Event>> {
        Ok(self.events.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.events.read().await.iter().find(|e| e.id == id).cloned())
    }

    async fn insert(&self, event: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            name: event.name,
            place: event.place,
            date: event.date,
            image: event.image,
            created_at: now,
            updated_at: now,
        };
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn update(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<UpdatedEvent>> {
        let mut events = self.events.write().await;
        let Some(event) = events.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };

        let previous_image = event.image.clone();
        event.name = changes.name;
        event.place = changes.place;
        event.date = changes.date;
        if let Some(image) = changes.image {
            event.image = Some(image);
        }
        event.updated_at = Utc::now();

        Ok(Some(UpdatedEvent {
            event: event.clone(),
            previous_image,
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let mut events = self.events.write().await;
        let index = events.iter().position(|e| e.id == id);
        Ok(index.map(|index| events.remove(index)))
    }
}

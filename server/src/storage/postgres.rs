use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent, UpdatedEvent};
use crate::storage::{EventStore, StoreResult};

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self))]
    async fn list(&self) -> StoreResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            "SELECT id, name, place, event_date, image, created_at, updated_at
             FROM events
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>> {
        sqlx::query_as::<_, Event>(
            "SELECT id, name, place, event_date, image, created_at, updated_at
             FROM events
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn insert(&self, event: NewEvent) -> StoreResult<Event> {
        sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, name, place, event_date, image)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, name, place, event_date, image, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(event.name)
        .bind(event.place)
        .bind(event.date)
        .bind(event.image)
        .fetch_one(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn update(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<UpdatedEvent>> {
        sqlx::query_as::<_, UpdatedEvent>(
            "UPDATE events AS e
             SET name = $2,
                 place = $3,
                 event_date = $4,
                 image = COALESCE($5, e.image),
                 updated_at = now()
             FROM (SELECT id, image FROM events WHERE id = $1 FOR UPDATE) AS prev
             WHERE e.id = prev.id
             RETURNING e.id, e.name, e.place, e.event_date, e.image, e.created_at, e.updated_at,
                       prev.image AS previous_image",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.place)
        .bind(changes.date)
        .bind(changes.image)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> StoreResult<Option<Event>> {
        sqlx::query_as::<_, Event>(
            "DELETE FROM events
             WHERE id = $1
             RETURNING id, name, place, event_date, image, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

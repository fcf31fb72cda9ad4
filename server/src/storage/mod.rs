pub mod images;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent, UpdatedEvent};

pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Persistence for event records. Lookups by unknown id yield `None`
/// rather than an error.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events in insertion order.
    async fn list(&self) -> StoreResult<Vec<Event>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>>;

    async fn insert(&self, event: NewEvent) -> StoreResult<Event>;

    /// Applies `changes` and reports the image reference the row held just
    /// before this write, so concurrent updates each see their own predecessor.
    async fn update(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<UpdatedEvent>>;

    /// Removes the event and returns it as it was before deletion.
    async fn delete(&self, id: Uuid) -> StoreResult<Option<Event>>;
}

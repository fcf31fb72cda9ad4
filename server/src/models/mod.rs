pub mod date;
pub mod event;

pub use event::{Event, EventChanges, EventInput, EventView, NewEvent, UpdatedEvent, ValidEventInput};

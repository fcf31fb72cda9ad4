use std::sync::Arc;

use crate::services::EventService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventService>,
    /// Configured public base URL; when absent it is derived per request.
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(events: EventService, public_base_url: Option<String>) -> Self {
        Self {
            events: Arc::new(events),
            public_base_url,
        }
    }
}

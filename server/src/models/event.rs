use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::date::parse_event_date;
use crate::utils::error::AppError;

/// An event as persisted. Serializes to the raw stored form returned by
/// `POST /createEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "eventname")]
    pub name: String,
    #[serde(rename = "eventplace")]
    pub place: String,
    #[serde(rename = "eventdate")]
    #[sqlx(rename = "event_date")]
    pub date: DateTime<Utc>,
    pub image: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Read form of an event: `eventdate` as `DD-MM-YYYY` and `image` as a
/// fetchable absolute URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "eventname")]
    pub name: String,
    #[serde(rename = "eventplace")]
    pub place: String,
    #[serde(rename = "eventdate")]
    pub date: String,
    pub image: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub place: String,
    pub date: DateTime<Utc>,
    pub image: Option<String>,
}

/// Field replacement for an existing event. `image: None` keeps the stored
/// image reference.
#[derive(Debug, Clone)]
pub struct EventChanges {
    pub name: String,
    pub place: String,
    pub date: DateTime<Utc>,
    pub image: Option<String>,
}

/// Result of an update: the event as written plus the image reference it
/// carried immediately before, read under the same row lock.
#[derive(Debug, Clone, FromRow)]
pub struct UpdatedEvent {
    #[sqlx(flatten)]
    pub event: Event,
    pub previous_image: Option<String>,
}

/// Unvalidated text fields as received from a create/update form.
#[derive(Debug, Clone, Default)]
pub struct EventInput {
    pub name: Option<String>,
    pub place: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEventInput {
    pub name: String,
    pub place: String,
    pub date: NaiveDate,
}

impl EventInput {
    pub fn validate(&self) -> Result<ValidEventInput, AppError> {
        let name = present(&self.name);
        let place = present(&self.place);
        let date = present(&self.date);

        let missing: Vec<&'static str> = [("eventname", name), ("eventplace", place), ("eventdate", date)]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(field, _)| field)
            .collect();

        match (name, place, date) {
            (Some(name), Some(place), Some(date)) => {
                let date = parse_event_date(date)
                    .ok_or_else(|| AppError::ValidationError("Invalid date format".to_string()))?;
                Ok(ValidEventInput {
                    name: name.to_string(),
                    place: place.to_string(),
                    date,
                })
            }
            _ => Err(AppError::MissingFields(missing)),
        }
    }
}

/// The value as sent, or `None` when it is absent or only whitespace.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

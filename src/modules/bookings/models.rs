use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A visitor's reservation for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    /// `id` of the booked event at the time of booking
    pub event_id: String,
    /// Trimmed and lower-cased
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Booking form submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub event_id: Option<String>,
    pub email: Option<String>,
}

use devevent_db::{Database, DbError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use super::models::Booking;
use crate::error::CoreError;
use crate::modules::events::EventRepository;

pub const TABLE: &str = "bookings";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Records visitor bookings against existing events.
#[derive(Clone)]
pub struct BookingRecorder {
    db: Database,
    events: EventRepository,
}

impl BookingRecorder {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            events: EventRepository::new(db),
        }
    }

    /// Book `email` onto the event with id `event_id`.
    ///
    /// The email is checked before the event lookup. The existence check and
    /// the insert are separate operations, so an event deleted in between
    /// still receives the booking.
    pub async fn create_booking(&self, event_id: &str, email: &str) -> Result<Booking, CoreError> {
        let email = email.trim().to_lowercase();
        if !EMAIL_PATTERN.is_match(&email) {
            return Err(CoreError::validation("email", "must be a valid email address"));
        }

        let event_id = event_id.trim();
        if !self.events.exists_by_id(event_id).await? {
            return Err(CoreError::not_found("Event does not exist"));
        }

        let now = OffsetDateTime::now_utc();
        let booking = Booking {
            id: Uuid::now_v7().to_string(),
            event_id: event_id.to_string(),
            email,
            created_at: now,
            updated_at: now,
        };

        self.insert(&booking).await?;
        tracing::info!(booking_id = %booking.id, event_id = %booking.event_id, "booking recorded");
        Ok(booking)
    }

    async fn insert(&self, booking: &Booking) -> Result<(), DbError> {
        self.db
            .client()?
            .query("CREATE type::thing($tb, $id) CONTENT $content RETURN NONE")
            .bind(json!({
                "tb": TABLE,
                "id": booking.id,
                "content": devevent_db::content(booking)?,
            }))
            .await?
            .check()?;
        Ok(())
    }
}

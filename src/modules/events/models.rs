use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CoreError, Violations};
use crate::utils::{
    datetime::{normalize_date, normalize_time},
    derive_slug,
};

/// How an event is attended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Online,
    Offline,
    Hybrid,
}

impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Mode::Online),
            "offline" => Ok(Mode::Offline),
            "hybrid" => Ok(Mode::Hybrid),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Online => "online",
            Mode::Offline => "offline",
            Mode::Hybrid => "hybrid",
        })
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque identifier assigned at creation
    pub id: String,
    pub title: String,
    /// URL identifier derived from `title`, unique across events
    pub slug: String,
    pub description: String,
    pub overview: String,
    /// URL of the externally hosted cover image
    pub image: String,
    pub venue: String,
    pub location: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:mm`, 24-hour
    pub time: String,
    pub mode: Mode,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Client-supplied event fields.
///
/// Every field is optional: on create, absent fields are reported as
/// validation errors; on update, absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub overview: Option<String>,
    pub image: Option<String>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub mode: Option<String>,
    pub audience: Option<String>,
    pub agenda: Option<Vec<String>>,
    pub organizer: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl EventInput {
    /// Fill every field missing from `self` with the stored value.
    pub fn merged_over(self, base: &Event) -> EventInput {
        EventInput {
            title: self.title.or_else(|| Some(base.title.clone())),
            description: self.description.or_else(|| Some(base.description.clone())),
            overview: self.overview.or_else(|| Some(base.overview.clone())),
            image: self.image.or_else(|| Some(base.image.clone())),
            venue: self.venue.or_else(|| Some(base.venue.clone())),
            location: self.location.or_else(|| Some(base.location.clone())),
            date: self.date.or_else(|| Some(base.date.clone())),
            time: self.time.or_else(|| Some(base.time.clone())),
            mode: self.mode.or_else(|| Some(base.mode.to_string())),
            audience: self.audience.or_else(|| Some(base.audience.clone())),
            agenda: self.agenda.or_else(|| Some(base.agenda.clone())),
            organizer: self.organizer.or_else(|| Some(base.organizer.clone())),
            tags: self.tags.or_else(|| Some(base.tags.clone())),
        }
    }

    /// Check and normalize every field, reporting all problems at once.
    pub fn validate(self) -> Result<EventFields, CoreError> {
        let mut violations = Violations::default();

        let title = required_text(&mut violations, "title", self.title);
        if !title.is_empty() && derive_slug(&title).is_empty() {
            violations.push("title", "must contain at least one letter or digit");
        }

        let description = required_text(&mut violations, "description", self.description);
        let overview = required_text(&mut violations, "overview", self.overview);
        let image = required_text(&mut violations, "image", self.image);
        let venue = required_text(&mut violations, "venue", self.venue);
        let location = required_text(&mut violations, "location", self.location);
        let audience = required_text(&mut violations, "audience", self.audience);
        let organizer = required_text(&mut violations, "organizer", self.organizer);

        let date = match required_text(&mut violations, "date", self.date) {
            raw if raw.is_empty() => raw,
            raw => normalize_date(&raw).unwrap_or_else(|| {
                violations.push("date", "must be YYYY-MM-DD or an RFC 3339 timestamp");
                String::new()
            }),
        };

        let time = match required_text(&mut violations, "time", self.time) {
            raw if raw.is_empty() => raw,
            raw => normalize_time(&raw).unwrap_or_else(|| {
                violations.push("time", "must be a time of day such as 09:30");
                String::new()
            }),
        };

        let mode = match self.mode.as_deref().map(str::parse::<Mode>) {
            Some(Ok(mode)) => Some(mode),
            Some(Err(())) => {
                violations.push("mode", "must be one of online, offline, hybrid");
                None
            }
            None => {
                violations.push("mode", "required");
                None
            }
        };

        let agenda = required_list(&mut violations, "agenda", self.agenda);
        let mut tags = required_list(&mut violations, "tags", self.tags);
        dedup_in_order(&mut tags);

        violations.finish("Invalid event")?;
        let mode = mode.ok_or_else(|| CoreError::validation("mode", "required"))?;

        Ok(EventFields {
            title,
            description,
            overview,
            image,
            venue,
            location,
            date,
            time,
            mode,
            audience,
            agenda,
            organizer,
            tags,
        })
    }
}

/// Validated, normalized event fields ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFields {
    pub title: String,
    pub description: String,
    pub overview: String,
    pub image: String,
    pub venue: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub mode: Mode,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
}

fn required_text(
    violations: &mut Violations,
    field: &'static str,
    value: Option<String>,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        violations.push(field, "required");
    }
    value
}

fn required_list(
    violations: &mut Violations,
    field: &'static str,
    value: Option<Vec<String>>,
) -> Vec<String> {
    let items: Vec<String> = value
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.trim().to_string())
        .collect();

    if items.is_empty() {
        violations.push(field, "at least one entry is required");
    } else if items.iter().any(String::is_empty) {
        violations.push(field, "entries must not be blank");
    }
    items
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}

/// Ordering for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Most recently created first (dashboard)
    Newest,
    /// Earliest date first, then earliest time (public listing)
    Upcoming,
}

/// One page of events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub events: Vec<Event>,
    pub total: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn input(title: &str, tags: &[&str]) -> EventInput {
        EventInput {
            title: Some(title.to_string()),
            description: Some("A day of talks and workshops".to_string()),
            overview: Some("Talks, workshops and networking".to_string()),
            image: Some("https://media.example.com/devevent/cover.png".to_string()),
            venue: Some("Moscone Center".to_string()),
            location: Some("San Francisco, CA".to_string()),
            date: Some("2025-11-07".to_string()),
            time: Some("9:30".to_string()),
            mode: Some("hybrid".to_string()),
            audience: Some("Developers".to_string()),
            agenda: Some(vec!["Keynote".to_string(), "Workshops".to_string()]),
            organizer: Some("DevEvent".to_string()),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
        }
    }
}

//! Event persistence: slug identity, pagination and similarity lookup.

use devevent_db::{retry_conflicts, Database, DbError};
use serde::{de::IgnoredAny, Deserialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use super::models::{Event, EventFields, EventInput, EventPage, ListOrder};
use crate::error::{CoreError, Violations};
use crate::utils::derive_slug;

pub const TABLE: &str = "events";

const SELECT_BY_SLUG: &str =
    "SELECT *, record::id(id) AS id FROM type::table($tb) WHERE slug = $slug LIMIT 1";
const SELECT_NEWEST: &str = "SELECT *, record::id(id) AS id FROM type::table($tb) \
     ORDER BY id DESC LIMIT $limit START $start";
const SELECT_UPCOMING: &str = "SELECT *, record::id(id) AS id FROM type::table($tb) \
     ORDER BY date ASC, time ASC, id ASC LIMIT $limit START $start";
const SELECT_SHARING_TAGS: &str = "SELECT *, record::id(id) AS id FROM type::table($tb) \
     WHERE tags CONTAINSANY $tags AND record::id(id) != $id ORDER BY id ASC";
const COUNT_ALL: &str = "SELECT count() AS total FROM type::table($tb) GROUP ALL";

#[derive(Deserialize)]
struct Count {
    total: u64,
}

/// CRUD and listing operations over the `events` table.
///
/// Slug uniqueness is enforced by the `events_slug_unique` index, so two
/// concurrent creates deriving the same slug resolve to one success and one
/// [`CoreError::Conflict`]. Ids are UUIDv7 strings, which sort in creation
/// order.
#[derive(Clone)]
pub struct EventRepository {
    db: Database,
}

impl EventRepository {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub async fn create(&self, input: EventInput) -> Result<Event, CoreError> {
        let fields = input.validate()?;
        let now = OffsetDateTime::now_utc();
        let slug = derive_slug(&fields.title);

        let event = build_event(Uuid::now_v7().to_string(), slug, fields, now, now);

        retry_conflicts(|| self.insert(&event)).await?;
        tracing::info!(id = %event.id, slug = %event.slug, "event created");
        Ok(event)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Event, CoreError> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| CoreError::not_found("Event not found"))
    }

    pub async fn exists_by_id(&self, id: &str) -> Result<bool, CoreError> {
        if id.is_empty() {
            return Ok(false);
        }
        Ok(self.exists(id).await?)
    }

    /// Apply `patch` to the event at `slug`.
    ///
    /// Only fields present in the patch change. A changed title re-derives
    /// the slug, which must not collide with any other event.
    pub async fn update_by_slug(&self, slug: &str, patch: EventInput) -> Result<Event, CoreError> {
        let existing = self.get_by_slug(slug).await?;
        let fields = patch.merged_over(&existing).validate()?;

        let new_slug = if fields.title != existing.title {
            derive_slug(&fields.title)
        } else {
            existing.slug.clone()
        };

        let updated = build_event(
            existing.id.clone(),
            new_slug,
            fields,
            existing.created_at,
            OffsetDateTime::now_utc(),
        );

        if !retry_conflicts(|| self.replace(&updated)).await? {
            // deleted between the read and the write
            return Err(CoreError::not_found("Event not found"));
        }

        tracing::info!(
            id = %updated.id,
            old_slug = %existing.slug,
            slug = %updated.slug,
            "event updated"
        );
        Ok(updated)
    }

    /// Remove the event at `slug`. Deleting a missing event is not an error.
    pub async fn delete_by_slug(&self, slug: &str) -> Result<u64, CoreError> {
        let deleted = self.remove(slug).await?;
        tracing::info!(slug, deleted, "event delete requested");
        Ok(deleted)
    }

    pub async fn list_paginated(
        &self,
        page: u64,
        limit: u64,
        order: ListOrder,
    ) -> Result<EventPage, CoreError> {
        let mut violations = Violations::default();
        if page < 1 {
            violations.push("page", "must be at least 1");
        }
        if limit < 1 {
            violations.push("limit", "must be at least 1");
        }
        violations.finish("Invalid pagination")?;

        let total = self.count().await?;
        let total_pages = total.div_ceil(limit);

        let sql = match order {
            ListOrder::Newest => SELECT_NEWEST,
            ListOrder::Upcoming => SELECT_UPCOMING,
        };
        let start = (page - 1).saturating_mul(limit);
        let events = self
            .select(sql, json!({ "tb": TABLE, "limit": limit, "start": start }))
            .await?;

        Ok(EventPage {
            events,
            total,
            current_page: page,
            total_pages,
        })
    }

    /// Events sharing at least one tag with the event at `slug`, in creation
    /// order. Best effort: an unknown slug or a store failure yields an empty
    /// list.
    pub async fn find_similar(&self, slug: &str) -> Vec<Event> {
        match self.try_find_similar(slug).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(slug, error = %e, "similar events lookup failed");
                Vec::new()
            }
        }
    }

    async fn try_find_similar(&self, slug: &str) -> Result<Vec<Event>, DbError> {
        let Some(source) = self.find_by_slug(slug).await? else {
            return Ok(Vec::new());
        };

        self.select(
            SELECT_SHARING_TAGS,
            json!({ "tb": TABLE, "tags": source.tags, "id": source.id }),
        )
        .await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Event>, DbError> {
        let events = self
            .select(SELECT_BY_SLUG, json!({ "tb": TABLE, "slug": slug }))
            .await?;
        Ok(events.into_iter().next())
    }

    async fn select(&self, sql: &'static str, vars: serde_json::Value) -> Result<Vec<Event>, DbError> {
        let events = self.db.client()?.query(sql).bind(vars).await?.take(0)?;
        Ok(events)
    }

    async fn count(&self) -> Result<u64, DbError> {
        let counts: Vec<Count> = self
            .db
            .client()?
            .query(COUNT_ALL)
            .bind(json!({ "tb": TABLE }))
            .await?
            .take(0)?;
        Ok(counts.first().map_or(0, |c| c.total))
    }

    async fn exists(&self, id: &str) -> Result<bool, DbError> {
        let found: Vec<IgnoredAny> = self
            .db
            .client()?
            .query("SELECT id FROM type::thing($tb, $id)")
            .bind(json!({ "tb": TABLE, "id": id }))
            .await?
            .take(0)?;
        Ok(!found.is_empty())
    }

    async fn remove(&self, slug: &str) -> Result<u64, DbError> {
        let removed: Vec<IgnoredAny> = self
            .db
            .client()?
            .query("DELETE type::table($tb) WHERE slug = $slug RETURN BEFORE")
            .bind(json!({ "tb": TABLE, "slug": slug }))
            .await?
            .take(0)?;
        Ok(removed.len() as u64)
    }

    async fn insert(&self, event: &Event) -> Result<(), DbError> {
        self.db
            .client()?
            .query("CREATE type::thing($tb, $id) CONTENT $content RETURN NONE")
            .bind(json!({
                "tb": TABLE,
                "id": event.id,
                "content": devevent_db::content(event)?,
            }))
            .await?
            .check()?;
        Ok(())
    }

    /// Overwrite an existing event; `false` when it no longer exists.
    async fn replace(&self, event: &Event) -> Result<bool, DbError> {
        let replaced: Vec<IgnoredAny> = self
            .db
            .client()?
            .query("UPDATE type::thing($tb, $id) CONTENT $content RETURN AFTER")
            .bind(json!({
                "tb": TABLE,
                "id": event.id,
                "content": devevent_db::content(event)?,
            }))
            .await?
            .take(0)?;
        Ok(!replaced.is_empty())
    }
}

fn build_event(
    id: String,
    slug: String,
    fields: EventFields,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> Event {
    Event {
        id,
        title: fields.title,
        slug,
        description: fields.description,
        overview: fields.overview,
        image: fields.image,
        venue: fields.venue,
        location: fields.location,
        date: fields.date,
        time: fields.time,
        mode: fields.mode,
        audience: fields.audience,
        agenda: fields.agenda,
        organizer: fields.organizer,
        tags: fields.tags,
        created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::events::{migrations, models::fixtures::input};

    async fn migrated() -> Database {
        let db = Database::in_memory().await.unwrap();
        for migration in migrations() {
            db.apply_migration(migration.id, migration.up).await.unwrap();
        }
        db
    }

    async fn repository() -> EventRepository {
        EventRepository::new(&migrated().await)
    }

    #[tokio::test]
    async fn create_derives_slug() {
        let repo = repository().await;
        let event = repo
            .create(input("Cloud & DevOps: 2025!", &["cloud"]))
            .await
            .unwrap();

        assert_eq!(event.slug, "cloud-devops-2025");
        assert_eq!(repo.get_by_slug("cloud-devops-2025").await.unwrap(), event);
    }

    #[tokio::test]
    async fn colliding_slug_is_a_conflict() {
        let repo = repository().await;
        repo.create(input("Rust Nation", &["rust"])).await.unwrap();

        let err = repo
            .create(input("rust   nation!", &["rust"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { ref field, ref value }
            if field == "slug" && value == "rust-nation"));
    }

    #[tokio::test]
    async fn concurrent_colliding_creates_have_one_winner() {
        let repo = repository().await;
        let mut handles = Vec::new();
        for title in ["Edge Days", "edge days", "EDGE-DAYS", "Edge Days!"] {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create(input(title, &["edge"])).await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(CoreError::Conflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!((created, conflicts), (1, 3));
    }

    #[tokio::test]
    async fn missing_slug_is_not_found() {
        let repo = repository().await;
        assert!(matches!(
            repo.get_by_slug("nope").await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.update_by_slug("nope", EventInput::default()).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn renaming_recomputes_slug() {
        let repo = repository().await;
        let original = repo.create(input("Old Title", &["misc"])).await.unwrap();
        assert_eq!(original.slug, "old-title");

        let patch = EventInput {
            title: Some("New Title".to_string()),
            ..EventInput::default()
        };
        let renamed = repo.update_by_slug("old-title", patch).await.unwrap();

        assert_eq!(renamed.slug, "new-title");
        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.created_at, original.created_at);
        assert!(renamed.updated_at >= original.updated_at);
        assert!(matches!(
            repo.get_by_slug("old-title").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields_and_slug() {
        let repo = repository().await;
        let original = repo.create(input("Old Title", &["misc"])).await.unwrap();

        let patch = EventInput {
            venue: Some("Online".to_string()),
            time: Some("6:00 PM".to_string()),
            ..EventInput::default()
        };
        let updated = repo.update_by_slug("old-title", patch).await.unwrap();

        assert_eq!(updated.slug, "old-title");
        assert_eq!(updated.venue, "Online");
        assert_eq!(updated.time, "18:00");
        assert_eq!(updated.title, original.title);
        assert_eq!(updated.tags, original.tags);
        assert_eq!(updated.agenda, original.agenda);
    }

    #[tokio::test]
    async fn rename_onto_existing_slug_conflicts() {
        let repo = repository().await;
        repo.create(input("First", &["a"])).await.unwrap();
        repo.create(input("Second", &["b"])).await.unwrap();

        let patch = EventInput {
            title: Some("FIRST".to_string()),
            ..EventInput::default()
        };
        assert!(matches!(
            repo.update_by_slug("second", patch).await,
            Err(CoreError::Conflict { .. })
        ));
        // title differing only in case keeps its own slug without conflict
        let patch = EventInput {
            title: Some("SECOND".to_string()),
            ..EventInput::default()
        };
        let updated = repo.update_by_slug("second", patch).await.unwrap();
        assert_eq!(updated.slug, "second");
    }

    #[tokio::test]
    async fn invalid_patch_is_rejected() {
        let repo = repository().await;
        repo.create(input("First", &["a"])).await.unwrap();

        let patch = EventInput {
            tags: Some(vec![]),
            ..EventInput::default()
        };
        assert!(matches!(
            repo.update_by_slug("first", patch).await,
            Err(CoreError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = repository().await;
        repo.create(input("Gone Soon", &["a"])).await.unwrap();

        assert_eq!(repo.delete_by_slug("gone-soon").await.unwrap(), 1);
        assert_eq!(repo.delete_by_slug("gone-soon").await.unwrap(), 0);
        assert_eq!(repo.delete_by_slug("never-existed").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pagination_over_53_events() {
        let repo = repository().await;
        for n in 1..=53 {
            repo.create(input(&format!("Event #{n}"), &["bulk"]))
                .await
                .unwrap();
        }

        let first = repo.list_paginated(1, 6, ListOrder::Newest).await.unwrap();
        assert_eq!(first.events.len(), 6);
        assert_eq!(first.total, 53);
        assert_eq!(first.total_pages, 9);
        assert_eq!(first.current_page, 1);

        let last = repo.list_paginated(9, 6, ListOrder::Newest).await.unwrap();
        assert_eq!(last.events.len(), 5);

        let past_end = repo.list_paginated(10, 6, ListOrder::Newest).await.unwrap();
        assert!(past_end.events.is_empty());
        assert_eq!(past_end.total_pages, 9);
    }

    #[tokio::test]
    async fn empty_store_has_zero_pages() {
        let repo = repository().await;
        let page = repo.list_paginated(1, 6, ListOrder::Upcoming).await.unwrap();
        assert!(page.events.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn pagination_rejects_zero_page_or_limit() {
        let repo = repository().await;
        assert!(matches!(
            repo.list_paginated(0, 6, ListOrder::Newest).await,
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            repo.list_paginated(1, 0, ListOrder::Newest).await,
            Err(CoreError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn listing_orders() {
        let repo = repository().await;
        for (title, date, time) in [
            ("Late", "2025-12-01", "10:00"),
            ("Early", "2025-01-15", "18:00"),
            ("Early Morning", "2025-01-15", "08:00"),
        ] {
            let mut raw = input(title, &["x"]);
            raw.date = Some(date.to_string());
            raw.time = Some(time.to_string());
            repo.create(raw).await.unwrap();
        }

        let upcoming = repo.list_paginated(1, 10, ListOrder::Upcoming).await.unwrap();
        let slugs: Vec<_> = upcoming.events.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, ["early-morning", "early", "late"]);

        let newest = repo.list_paginated(1, 10, ListOrder::Newest).await.unwrap();
        assert!(newest
            .events
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[tokio::test]
    async fn similar_events_share_a_tag_and_exclude_source() {
        let repo = repository().await;
        repo.create(input("Source", &["rust", "wasm"])).await.unwrap();
        repo.create(input("Rusty", &["rust"])).await.unwrap();
        repo.create(input("Unrelated", &["python"])).await.unwrap();
        repo.create(input("Wasm Day", &["web", "wasm"])).await.unwrap();

        let similar: Vec<_> = repo
            .find_similar("source")
            .await
            .into_iter()
            .map(|e| e.slug)
            .collect();
        assert_eq!(similar, ["rusty", "wasm-day"]);
    }

    #[tokio::test]
    async fn similar_events_for_unknown_slug_is_empty() {
        let repo = repository().await;
        repo.create(input("Source", &["rust"])).await.unwrap();
        assert!(repo.find_similar("missing").await.is_empty());
    }

    #[tokio::test]
    async fn similar_events_degrade_on_store_failure() {
        let db = migrated().await;
        let repo = EventRepository::new(&db);
        repo.create(input("Source", &["rust"])).await.unwrap();
        repo.create(input("Other", &["rust"])).await.unwrap();
        db.close().await.unwrap();

        assert!(repo.find_similar("source").await.is_empty());
        assert!(matches!(
            repo.get_by_slug("source").await,
            Err(CoreError::Store(DbError::Closed))
        ));
    }
}

//! SurrealDB handle for DevEvent.
//!
//! The handle has an explicit lifecycle: [`Database::connect`] once at
//! startup, clone it into whatever needs it, and [`Database::close`] on
//! shutdown. Every write is committed by SurrealDB before the query returns,
//! so nothing is lost when the process dies without closing. Endpoints:
//!
//! - `mem://` keeps everything in process memory.
//! - `surrealkv://<path>` stores data in an embedded SurrealKV directory.
//!
//! Unique constraints are SurrealDB `UNIQUE` indexes named
//! `{table}_{field}_unique`; a violation surfaces as
//! [`DbError::DuplicateKey`].

use std::{
    future::Future,
    path::PathBuf,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{de::IgnoredAny, Serialize};
use surrealdb::{
    engine::any::{self, Any},
    Surreal,
};

pub mod error;

pub use error::DbError;

/// Table recording which migrations have run.
const MIGRATIONS_TABLE: &str = "_migrations";

/// How many times a write that lost a transaction race is attempted.
const MAX_ATTEMPTS: u32 = 5;

/// Where SurrealDB keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Memory,
    SurrealKv(PathBuf),
}

impl Endpoint {
    /// Address understood by the SurrealDB `any` engine.
    pub fn address(&self) -> String {
        match self {
            Endpoint::Memory => "mem://".to_string(),
            Endpoint::SurrealKv(path) => format!("surrealkv://{}", path.display()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("mem://") {
            return Ok(Endpoint::Memory);
        }

        match s.strip_prefix("surrealkv://") {
            Some(path) if !path.is_empty() => Ok(Endpoint::SurrealKv(PathBuf::from(path))),
            _ => Err(DbError::UnsupportedEndpoint(s.to_string())),
        }
    }
}

/// Cloneable handle over one SurrealDB namespace and database.
#[derive(Clone)]
pub struct Database {
    client: Surreal<Any>,
    endpoint: Arc<str>,
    closed: Arc<AtomicBool>,
}

impl Database {
    /// Open `endpoint` and select `namespace` / `database`.
    pub async fn connect(endpoint: &str, namespace: &str, database: &str) -> Result<Self, DbError> {
        let parsed: Endpoint = endpoint.parse()?;
        if let Endpoint::SurrealKv(path) = &parsed {
            tokio::fs::create_dir_all(path).await?;
        }

        let client = any::connect(parsed.address()).await?;
        client.use_ns(namespace).use_db(database).await?;

        tracing::debug!(endpoint, namespace, database, "surrealdb connected");
        Ok(Self {
            client,
            endpoint: Arc::from(endpoint),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Fresh in-memory database, used by tests and offline tooling.
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::connect("mem://", "devevent", "scratch").await
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The underlying client, or [`DbError::Closed`] once closed.
    pub fn client(&self) -> Result<&Surreal<Any>, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        Ok(&self.client)
    }

    /// Run SurrealQL that returns nothing of interest, failing on the first
    /// statement error.
    pub async fn execute(&self, sql: &'static str) -> Result<(), DbError> {
        self.client()?.query(sql).await?.check()?;
        Ok(())
    }

    /// Run the migration `up` under `key` unless it was already recorded.
    /// Returns whether it ran.
    pub async fn apply_migration(&self, key: &str, up: &'static str) -> Result<bool, DbError> {
        let client = self.client()?;

        let applied: Vec<IgnoredAny> = client
            .query("SELECT id FROM type::thing($tb, $key)")
            .bind(("tb", MIGRATIONS_TABLE))
            .bind(("key", key.to_string()))
            .await?
            .take(0)?;
        if !applied.is_empty() {
            return Ok(false);
        }

        client.query(up).await?.check()?;
        client
            .query("UPSERT type::thing($tb, $key) SET appliedAt = time::now() RETURN NONE")
            .bind(("tb", MIGRATIONS_TABLE))
            .bind(("key", key.to_string()))
            .await?
            .check()?;
        Ok(true)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the handle closed for every clone. Idempotent.
    pub async fn close(&self) -> Result<(), DbError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(endpoint = %self.endpoint, "surrealdb handle closed");
        Ok(())
    }
}

/// Serialize `record` for a `CONTENT` clause. The `id` field is dropped
/// because the record id is given separately as `type::thing($tb, $id)`.
pub fn content<T: Serialize>(record: &T) -> Result<serde_json::Value, DbError> {
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("id");
    }
    Ok(value)
}

/// Run `op` again while it fails with [`DbError::Retryable`].
pub async fn retry_conflicts<T, F, Fut>(mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                tracing::debug!(attempt, error = %e, "retrying conflicted write");
                tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Note {
        slug: String,
    }

    async fn insert_note(db: &Database, id: &str, slug: &str) -> Result<(), DbError> {
        db.client()?
            .query("CREATE type::thing('notes', $id) CONTENT { slug: $slug } RETURN NONE")
            .bind(("id", id.to_string()))
            .bind(("slug", slug.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    async fn note_slugs(db: &Database) -> Vec<String> {
        let notes: Vec<Note> = db
            .client()
            .unwrap()
            .query("SELECT slug FROM notes ORDER BY slug")
            .await
            .unwrap()
            .take(0)
            .unwrap();
        notes.into_iter().map(|n| n.slug).collect()
    }

    #[test]
    fn parses_endpoints() {
        assert_eq!("mem://".parse::<Endpoint>().unwrap(), Endpoint::Memory);
        assert_eq!(
            "surrealkv://data/devevent.db".parse::<Endpoint>().unwrap(),
            Endpoint::SurrealKv(PathBuf::from("data/devevent.db"))
        );
        assert_eq!(
            Endpoint::SurrealKv(PathBuf::from("data/devevent.db")).address(),
            "surrealkv://data/devevent.db"
        );
        assert!(matches!(
            "ws://127.0.0.1:8000".parse::<Endpoint>(),
            Err(DbError::UnsupportedEndpoint(_))
        ));
        assert!("surrealkv://".parse::<Endpoint>().is_err());
    }

    #[tokio::test]
    async fn closed_handle_rejects_operations() {
        let db = Database::in_memory().await.unwrap();
        let other = db.clone();
        db.close().await.unwrap();

        assert!(other.is_closed());
        assert!(matches!(other.client(), Err(DbError::Closed)));
        assert!(matches!(
            other.execute("INFO FOR DB").await,
            Err(DbError::Closed)
        ));
        // closing twice is fine
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unique_index_violation_is_a_duplicate_key() {
        let db = Database::in_memory().await.unwrap();
        db.execute("DEFINE INDEX IF NOT EXISTS notes_slug_unique ON TABLE notes FIELDS slug UNIQUE")
            .await
            .unwrap();

        insert_note(&db, "a", "hello").await.unwrap();
        let err = insert_note(&db, "b", "hello").await.unwrap_err();

        assert!(
            matches!(&err, DbError::DuplicateKey { table, field, value }
                if table == "notes" && field == "slug" && value == "hello"),
            "{err:?}"
        );
        assert_eq!(note_slugs(&db).await, ["hello"]);
    }

    #[tokio::test]
    async fn migrations_run_once_per_key() {
        let db = Database::in_memory().await.unwrap();
        let up = "CREATE notes:seed CONTENT { slug: 'seed' }";

        assert!(db.apply_migration("notes_001_seed", up).await.unwrap());
        assert!(!db.apply_migration("notes_001_seed", up).await.unwrap());
        assert_eq!(note_slugs(&db).await, ["seed"]);

        let err = db
            .apply_migration("notes_002_broken", "DEFINE NONSENSE")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Surreal(_)), "{err:?}");
    }

    #[test]
    fn content_drops_the_id() {
        #[derive(Serialize)]
        struct Draft {
            id: String,
            slug: String,
        }

        let value = content(&Draft {
            id: "n1".to_string(),
            slug: "hello".to_string(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({ "slug": "hello" }));
    }

    #[tokio::test]
    async fn retry_gives_up_on_other_errors() {
        let mut calls = 0;
        let result: Result<(), DbError> = retry_conflicts(|| {
            calls += 1;
            async { Err(DbError::Closed) }
        })
        .await;
        assert!(matches!(result, Err(DbError::Closed)));
        assert_eq!(calls, 1);

        let mut calls = 0;
        let result = retry_conflicts(|| {
            calls += 1;
            let outcome = if calls < 3 {
                Err(DbError::Retryable("conflict".to_string()))
            } else {
                Ok(calls)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn surrealkv_writes_survive_a_dropped_handle() {
        let dir = std::env::temp_dir().join(format!("devevent-db-{}", uuid::Uuid::new_v4()));
        let endpoint = format!("surrealkv://{}", dir.display());

        let db = Database::connect(&endpoint, "devevent", "test").await.unwrap();
        insert_note(&db, "n1", "persist-me").await.unwrap();
        // no close: the process may die at any point after a write returns
        drop(db);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let reopened = Database::connect(&endpoint, "devevent", "test").await.unwrap();
        assert_eq!(note_slugs(&reopened).await, ["persist-me"]);

        reopened.close().await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unsupported_endpoint_is_rejected_before_connecting() {
        let err = Database::connect("mongodb://localhost:27017", "devevent", "test")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::UnsupportedEndpoint(_)));
    }
}

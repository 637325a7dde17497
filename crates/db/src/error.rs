//! Error type for the SurrealDB handle

use thiserror::Error;

/// Failures surfaced by [`crate::Database`] and the queries run through it.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database handle is closed")]
    Closed,

    #[error("duplicate key on {table}.{field}: {value}")]
    DuplicateKey {
        table: String,
        field: String,
        value: String,
    },

    /// A write lost an optimistic transaction race and may be run again.
    #[error("transaction conflict: {0}")]
    Retryable(String),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported database endpoint '{0}'; expected mem:// or surrealkv://<path>")]
    UnsupportedEndpoint(String),

    #[error("failed to prepare data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("surrealdb: {0}")]
    Surreal(surrealdb::Error),
}

impl DbError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Retryable(_))
    }
}

impl From<surrealdb::Error> for DbError {
    fn from(err: surrealdb::Error) -> Self {
        if let surrealdb::Error::Db(surrealdb::error::Db::IndexExists { index, value, .. }) = &err
        {
            let (table, field) = split_index_name(index);
            return DbError::DuplicateKey {
                table: table.to_string(),
                field: field.to_string(),
                value: value.trim_matches(|c| c == '\'' || c == '"').to_string(),
            };
        }

        let message = err.to_string();
        if message.contains("can be retried") {
            return DbError::Retryable(message);
        }

        DbError::Surreal(err)
    }
}

/// Unique indexes are named `{table}_{field}_unique`.
pub fn split_index_name(index: &str) -> (&str, &str) {
    index
        .strip_suffix("_unique")
        .and_then(|rest| rest.split_once('_'))
        .unwrap_or((index, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_split_into_table_and_field() {
        assert_eq!(split_index_name("events_slug_unique"), ("events", "slug"));
        assert_eq!(
            split_index_name("bookings_event_id_unique"),
            ("bookings", "event_id")
        );
        assert_eq!(split_index_name("adhoc"), ("adhoc", "adhoc"));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DbError::Retryable("conflict".to_string()).is_retryable());
        assert!(!DbError::Closed.is_retryable());
    }
}

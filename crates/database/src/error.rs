//! Error type for the storage layer.
//!
//! Unique-key conflicts get their own classification because callers react
//! to them: the processed-event ledger treats a lost insert race as "already
//! recorded", and create paths surface them as [`DatabaseError::AlreadyExists`]
//! instead of an opaque driver failure.

use thiserror::Error;

/// Errors surfaced by storage operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying driver failure (pool, query, row decode).
    #[error("storage failure: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Schema migration failed at startup.
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A lookup by key matched no row.
    #[error("no {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// An insert collided with an existing row under the same key.
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },
}

impl DatabaseError {
    /// Classify an insert failure: a unique-key conflict on `entity`/`id`
    /// becomes [`Self::AlreadyExists`], anything else passes through.
    pub fn on_insert(err: sqlx::Error, entity: &'static str, id: &str) -> Self {
        if is_duplicate_key(&err) {
            return Self::AlreadyExists {
                entity,
                id: id.to_string(),
            };
        }
        Self::Sqlx(err)
    }
}

/// True when the driver reports a unique-constraint conflict.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

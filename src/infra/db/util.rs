use sqlx::error::DatabaseError;

use crate::application::repos::RepoError;

// Postgres SQLSTATE classes this schema can actually raise.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const QUERY_CANCELED: &str = "57014";

/// Translate a driver error into the repository error taxonomy.
///
/// Unique violations carry their constraint name (`users_username_key`,
/// `groups_slug_key`, `follows_pkey`) so callers can tell which record
/// collided. Check violations name the failed rule, which for this schema
/// means blank text/title or the `follows_no_self` guard.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => map_database_error(db.as_ref()),
        other => RepoError::from_persistence(other),
    }
}

fn map_database_error(db: &dyn DatabaseError) -> RepoError {
    let constraint = db.constraint().unwrap_or("unknown");
    match db.code().as_deref() {
        Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
            constraint: constraint.to_string(),
        },
        Some(FOREIGN_KEY_VIOLATION) => RepoError::InvalidInput {
            message: format!("referenced row is missing ({constraint})"),
        },
        Some(CHECK_VIOLATION) => RepoError::Integrity {
            message: format!("check `{constraint}` failed"),
        },
        Some(NOT_NULL_VIOLATION) => RepoError::InvalidInput {
            message: "required column was null".to_string(),
        },
        Some(QUERY_CANCELED) => RepoError::Timeout,
        _ => RepoError::from_persistence(db.message()),
    }
}

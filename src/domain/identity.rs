//! Acting identity and the author-only mutation guard.
//!
//! The acting user is resolved once per request and passed explicitly into
//! every query and mutation; no ambient per-request state exists.

use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;

/// The identity a request acts as: a signed-in user or anonymous.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    user: Option<UserRecord>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: UserRecord) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }
}

/// True iff the acting user owns the resource.
///
/// Authorization failures are surfaced as a redirect to the resource's read
/// view, never as an error status; callers branch on this result instead of
/// propagating an error.
pub fn can_mutate(actor: &UserRecord, owner_id: i64) -> bool {
    actor.id == owner_id
}

/// Validate a username for account creation: non-empty, at most 64 bytes,
/// ASCII alphanumerics plus `-` and `_` (the cookie-safe subset).
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.is_empty() {
        return Err(DomainError::validation("username must not be empty"));
    }
    if username.len() > 64 {
        return Err(DomainError::validation("username exceeds 64 bytes"));
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(DomainError::validation(
            "username may only contain ASCII letters, digits, `-` and `_`",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn user(id: i64, username: &str) -> UserRecord {
        UserRecord {
            id,
            username: username.to_string(),
            joined_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn author_may_mutate_own_resource() {
        let author = user(7, "author");
        assert!(can_mutate(&author, 7));
    }

    #[test]
    fn non_author_may_not_mutate() {
        let other = user(8, "other");
        assert!(!can_mutate(&other, 7));
    }

    #[test]
    fn viewer_exposes_identity() {
        let viewer = Viewer::authenticated(user(1, "leo"));
        assert!(!viewer.is_anonymous());
        assert_eq!(viewer.username(), Some("leo"));

        let anonymous = Viewer::anonymous();
        assert!(anonymous.is_anonymous());
        assert!(anonymous.user().is_none());
    }

    #[test]
    fn username_validation_rejects_unsafe_input() {
        assert!(validate_username("leo-99_x").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("semi;colon").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }
}

//! Subscription management between readers and authors.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Follow/unfollow mutations. Both directions are idempotent: repeating a
/// follow, unfollowing an absent relation, or targeting yourself all settle
/// into the same end state without erroring.
#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }

    pub async fn follow(&self, subscriber: &UserRecord, username: &str) -> Result<(), FollowError> {
        let author = self.resolve_author(username).await?;
        if author.id == subscriber.id {
            debug!(user = %subscriber.username, "self-follow ignored");
            return Ok(());
        }
        self.follows.create_follow(subscriber.id, author.id).await?;
        Ok(())
    }

    pub async fn unfollow(
        &self,
        subscriber: &UserRecord,
        username: &str,
    ) -> Result<(), FollowError> {
        let author = self.resolve_author(username).await?;
        if author.id == subscriber.id {
            return Ok(());
        }
        self.follows.delete_follow(subscriber.id, author.id).await?;
        Ok(())
    }
}

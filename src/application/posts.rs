//! Post and comment mutations with the author-only guard.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::forms::NewPost;
use crate::application::repos::{
    AddCommentParams, CommentsRepo, CreatePostParams, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::identity::can_mutate;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of a guarded mutation. A non-author attempt is not an error; the
/// handler turns it into a redirect to the post's read view.
#[derive(Debug)]
pub enum MutationOutcome<T> {
    Applied(T),
    NotAuthor { post_id: i64 },
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            writes,
            comments,
        }
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        draft: NewPost,
    ) -> Result<PostRecord, PostError> {
        let post = self
            .writes
            .create_post(CreatePostParams {
                author_id: author.id,
                text: draft.text,
                group_id: draft.group_id,
                image: draft.image,
            })
            .await?;
        info!(post_id = post.id, author = %author.username, "post created");
        Ok(post)
    }

    /// Replace a post's text, group and image. Only the author may edit;
    /// anyone else gets `NotAuthor` and the post stays untouched.
    pub async fn update_post(
        &self,
        actor: &UserRecord,
        post_id: i64,
        draft: NewPost,
    ) -> Result<MutationOutcome<PostRecord>, PostError> {
        let existing = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        if !can_mutate(actor, existing.author_id) {
            return Ok(MutationOutcome::NotAuthor { post_id });
        }

        let updated = self
            .writes
            .update_post(UpdatePostParams {
                id: post_id,
                text: draft.text,
                group_id: draft.group_id,
                image: draft.image,
            })
            .await?;
        info!(post_id, actor = %actor.username, "post updated");
        Ok(MutationOutcome::Applied(updated))
    }

    pub async fn delete_post(
        &self,
        actor: &UserRecord,
        post_id: i64,
    ) -> Result<MutationOutcome<()>, PostError> {
        let existing = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        if !can_mutate(actor, existing.author_id) {
            return Ok(MutationOutcome::NotAuthor { post_id });
        }

        self.writes.delete_post(post_id).await?;
        info!(post_id, actor = %actor.username, "post deleted");
        Ok(MutationOutcome::Applied(()))
    }

    /// Attach a comment to an existing post. Blank text is silently
    /// discarded; the caller redirects back to the post either way.
    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<Option<CommentRecord>, PostError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(PostError::NotFound);
        }

        let comment = self
            .comments
            .add_comment(AddCommentParams {
                post_id,
                author_id: author.id,
                text: trimmed.to_string(),
            })
            .await?;
        Ok(Some(comment))
    }
}

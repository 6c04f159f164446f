//! Feed assembly: ordered, filtered, paginated post listings.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{FeedPage, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostQueryFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::identity::Viewer;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A group feed together with the group's own metadata.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: FeedPage<PostRecord>,
}

/// An author feed plus the viewer's follow state and the author's totals.
#[derive(Debug, Clone)]
pub struct AuthorFeed {
    pub author: UserRecord,
    pub page: FeedPage<PostRecord>,
    /// Whether the current viewer follows this author; always false for
    /// anonymous viewers.
    pub following: bool,
    pub post_count: u64,
}

/// A single post with its comments and the author's total post count.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
}

/// Read-only queries behind every feed page. All listings are newest first
/// and pre-join author and group data; empty results are an empty page,
/// never an error.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
            paginator,
        }
    }

    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    async fn page_for(
        &self,
        filter: &PostQueryFilter,
        requested_page: u32,
    ) -> Result<FeedPage<PostRecord>, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        let window = self.paginator.window(total, requested_page);
        let items = self.posts.list_posts(filter, window).await?;
        Ok(self.paginator.assemble(window, items))
    }

    /// All posts, newest first.
    pub async fn global_page(&self, page: u32) -> Result<FeedPage<PostRecord>, FeedError> {
        self.page_for(&PostQueryFilter::default(), page).await
    }

    /// Posts filed under the group with the given slug.
    pub async fn group_page(&self, slug: &str, page: u32) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;

        let page = self.page_for(&PostQueryFilter::group(group.id), page).await?;
        Ok(GroupFeed { group, page })
    }

    /// Posts by a single author, plus whether the viewer follows them.
    pub async fn author_page(
        &self,
        username: &str,
        viewer: &Viewer,
        page: u32,
    ) -> Result<AuthorFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)?;

        let filter = PostQueryFilter::author(author.id);
        let post_count = self.posts.count_posts(&filter).await?;
        let window = self.paginator.window(post_count, page);
        let items = self.posts.list_posts(&filter, window).await?;

        let following = match viewer.user() {
            Some(user) => self.follows.is_following(user.id, author.id).await?,
            None => false,
        };

        Ok(AuthorFeed {
            author,
            page: self.paginator.assemble(window, items),
            following,
            post_count,
        })
    }

    /// Posts by every author the subscriber follows. Callers gate on an
    /// authenticated identity before reaching this query.
    pub async fn subscription_page(
        &self,
        subscriber: &UserRecord,
        page: u32,
    ) -> Result<FeedPage<PostRecord>, FeedError> {
        self.page_for(&PostQueryFilter::followed_by(subscriber.id), page)
            .await
    }

    /// A single post with ascending comments and the author's post count.
    pub async fn post_detail(&self, id: i64) -> Result<Option<PostDetail>, FeedError> {
        let Some(post) = self.posts.find_by_id(id).await? else {
            return Ok(None);
        };

        let comments = self.comments.list_for_post(post.id).await?;
        let author_post_count = self
            .posts
            .count_posts(&PostQueryFilter::author(post.author_id))
            .await?;

        Ok(Some(PostDetail {
            post,
            comments,
            author_post_count,
        }))
    }
}

//! Shared fixture: an in-memory persistence layer behind the repository
//! traits, plus helpers to build a router and drive it with `oneshot`.

#![allow(dead_code)]

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use brusio::application::feed::FeedService;
use brusio::application::follows::FollowService;
use brusio::application::pagination::{PageWindow, Paginator};
use brusio::application::posts::PostService;
use brusio::application::repos::{
    AddCommentParams, CommentsRepo, CreateGroupParams, CreatePostParams, FollowsRepo, GroupsRepo,
    HealthRepo, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
};
use brusio::cache::{CacheConfig, CacheState};
use brusio::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use brusio::infra::http::{HttpState, SESSION_COOKIE, build_router};
use http_body_util::BodyExt;
use time::{Duration, OffsetDateTime, macros::datetime};

const EPOCH: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

#[derive(Default)]
pub struct MemoryRepos {
    users: Mutex<Vec<UserRecord>>,
    groups: Mutex<Vec<GroupRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    comments: Mutex<Vec<CommentRecord>>,
    follows: Mutex<HashSet<(i64, i64)>>,
    next_id: AtomicI64,
}

impl MemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        })
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn seed_user(&self, username: &str) -> UserRecord {
        let user = UserRecord {
            id: self.allocate_id(),
            username: username.to_string(),
            joined_at: EPOCH,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn seed_group(&self, title: &str, slug: &str) -> GroupRecord {
        let group = GroupRecord {
            id: self.allocate_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        self.groups.lock().unwrap().push(group.clone());
        group
    }

    /// Insert a post; later seeds publish later, so listings come back in
    /// reverse seed order.
    pub fn seed_post(&self, author: &UserRecord, group: Option<&GroupRecord>, text: &str) -> PostRecord {
        let id = self.allocate_id();
        let post = PostRecord {
            id,
            text: text.to_string(),
            published_at: EPOCH + Duration::seconds(id),
            author_id: author.id,
            author_username: author.username.clone(),
            group_id: group.map(|g| g.id),
            group_slug: group.map(|g| g.slug.clone()),
            group_title: group.map(|g| g.title.clone()),
            image: None,
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    pub fn seed_follow(&self, user: &UserRecord, author: &UserRecord) {
        self.follows.lock().unwrap().insert((user.id, author.id));
    }

    pub fn post_text(&self, id: i64) -> Option<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.id == id)
            .map(|post| post.text.clone())
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn comment_count(&self, post_id: i64) -> usize {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count()
    }

    pub fn follow_exists(&self, user_id: i64, author_id: i64) -> bool {
        self.follows.lock().unwrap().contains(&(user_id, author_id))
    }

    fn matches(post: &PostRecord, filter: &PostQueryFilter, follows: &HashSet<(i64, i64)>) -> bool {
        if let Some(group_id) = filter.group_id {
            if post.group_id != Some(group_id) {
                return false;
            }
        }
        if let Some(author_id) = filter.author_id {
            if post.author_id != author_id {
                return false;
            }
        }
        if let Some(subscriber) = filter.followed_by {
            if !follows.contains(&(subscriber, post.author_id)) {
                return false;
            }
        }
        true
    }

    fn filtered_posts(&self, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let follows = self.follows.lock().unwrap();
        let mut posts: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| Self::matches(post, filter, &follows))
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let posts = self.filtered_posts(filter);
        Ok(posts
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect())
    }

    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        Ok(self.filtered_posts(filter).len() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.id == id)
            .cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let author = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == params.author_id)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        let group = params.group_id.and_then(|group_id| {
            self.groups
                .lock()
                .unwrap()
                .iter()
                .find(|group| group.id == group_id)
                .cloned()
        });

        let id = self.allocate_id();
        let post = PostRecord {
            id,
            text: params.text,
            published_at: EPOCH + Duration::seconds(id),
            author_id: author.id,
            author_username: author.username,
            group_id: group.as_ref().map(|g| g.id),
            group_slug: group.as_ref().map(|g| g.slug.clone()),
            group_title: group.as_ref().map(|g| g.title.clone()),
            image: params.image,
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let group = params.group_id.and_then(|group_id| {
            self.groups
                .lock()
                .unwrap()
                .iter()
                .find(|group| group.id == group_id)
                .cloned()
        });

        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = group.as_ref().map(|g| g.id);
        post.group_slug = group.as_ref().map(|g| g.slug.clone());
        post.group_title = group.as_ref().map(|g| g.title.clone());
        post.image = params.image;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|post| post.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        self.comments
            .lock()
            .unwrap()
            .retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.groups.lock().unwrap().clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let group = GroupRecord {
            id: self.allocate_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        self.groups.lock().unwrap().push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    async fn add_comment(&self, params: AddCommentParams) -> Result<CommentRecord, RepoError> {
        let author = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == params.author_id)
            .cloned()
            .ok_or(RepoError::NotFound)?;

        let id = self.allocate_id();
        let comment = CommentRecord {
            id,
            post_id: params.post_id,
            author_id: author.id,
            author_username: author.username,
            text: params.text,
            created_at: EPOCH + Duration::seconds(id),
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepos {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.follows.lock().unwrap().contains(&(user_id, author_id)))
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<(), RepoError> {
        self.follows.lock().unwrap().insert((user_id, author_id));
        Ok(())
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<(), RepoError> {
        self.follows.lock().unwrap().remove(&(user_id, author_id));
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        if self.find_by_username(username).await?.is_some() {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        Ok(self.seed_user(username))
    }
}

#[async_trait]
impl HealthRepo for MemoryRepos {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub fn build_state(repos: &Arc<MemoryRepos>, cache: Option<CacheState>) -> HttpState {
    let paginator = Paginator::new(NonZeroU32::new(10).expect("page size"));
    let feed = Arc::new(FeedService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        paginator,
    ));
    let post_service = Arc::new(PostService::new(repos.clone(), repos.clone(), repos.clone()));
    let follow_service = Arc::new(FollowService::new(repos.clone(), repos.clone()));

    HttpState {
        feed,
        posts: post_service,
        follows: follow_service,
        users: repos.clone(),
        groups: repos.clone(),
        health: repos.clone(),
        cache,
    }
}

pub fn app(repos: &Arc<MemoryRepos>) -> Router {
    build_router(build_state(repos, None))
}

pub fn app_with_cache(repos: &Arc<MemoryRepos>, config: CacheConfig) -> (Router, CacheState) {
    let cache = CacheState::new(config);
    let router = build_router(build_state(repos, Some(cache.clone())));
    (router, cache)
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request")
}

pub fn get_as(path: &str, username: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={username}"))
        .body(Body::empty())
        .expect("request")
}

pub fn post_form(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn post_form_as(path: &str, body: &str, username: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, format!("{SESSION_COOKIE}={username}"))
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

pub fn count_articles(html: &str) -> usize {
    html.matches("<article>").count()
}

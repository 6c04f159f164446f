use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Form, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        feed::{FeedError, FeedService},
        follows::{FollowError, FollowService},
        forms::{CommentForm, PostForm},
        posts::{MutationOutcome, PostError, PostService},
        repos::{GroupsRepo, HealthRepo, UsersRepo},
    },
    cache::{CacheState, page_cache_layer},
    domain::{entities::UserRecord, identity::Viewer},
    presentation::views::{
        FeedContext, FollowTemplate, FormErrorsView, GroupTemplate, IndexTemplate, PostCard,
        PostDetailTemplate, PostFormTemplate, ProfileTemplate, ViewerView, group_options,
        render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{self, login_redirect},
    db_health_response,
    middleware::{log_responses, resolve_viewer, set_request_context},
    repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub users: Arc<dyn UsersRepo>,
    pub groups: Arc<dyn GroupsRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the global feed is served through the page cache; every other
    // page renders live.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
    } else {
        cached_routes
    };

    let live_routes = Router::new()
        .route("/group/{slug}/", get(group_index))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/create/", get(create_post_form).post(create_post_submit))
        .route(
            "/posts/{id}/edit/",
            get(edit_post_form).post(edit_post_submit),
        )
        .route("/posts/{id}/delete/", get(delete_post).post(delete_post))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/follow/", get(follow_index))
        .route(
            "/profile/{username}/follow/",
            get(follow_author).post(follow_author),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(unfollow_author).post(unfollow_author),
        )
        .route(
            "/auth/login/",
            get(auth::login_form).post(auth::login_submit),
        )
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/_health/db", get(health));

    cached_routes
        .merge(live_routes)
        .fallback(fallback)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, resolve_viewer))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// A page parameter that is absent or unparseable means page one.
    fn number(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(1)
    }
}

fn require_user<'a>(viewer: &'a Viewer, next: &str) -> Result<&'a UserRecord, Response> {
    viewer.user().ok_or_else(|| login_redirect(next))
}

fn feed_error_to_response(err: FeedError, viewer: &Viewer) -> Response {
    match err {
        FeedError::UnknownGroup | FeedError::UnknownAuthor => render_not_found_response(viewer),
        other => HttpError::from(other).into_response(),
    }
}

fn post_error_to_response(err: PostError, viewer: &Viewer) -> Response {
    match err {
        PostError::NotFound => render_not_found_response(viewer),
        other => HttpError::from(other).into_response(),
    }
}

fn follow_error_to_response(err: FollowError, viewer: &Viewer) -> Response {
    match err {
        FollowError::UnknownAuthor => render_not_found_response(viewer),
        other => HttpError::from(other).into_response(),
    }
}

fn post_path(id: i64) -> String {
    format!("/posts/{id}/")
}

fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse().ok().filter(|id| *id > 0)
}

async fn index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.global_page(query.number()).await {
        Ok(page) => render_template_response(
            IndexTemplate {
                viewer: ViewerView::from_viewer(&viewer),
                feed: FeedContext::from_page(&page),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn group_index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_page(&slug, query.number()).await {
        Ok(group_feed) => render_template_response(
            GroupTemplate {
                viewer: ViewerView::from_viewer(&viewer),
                title: group_feed.group.title,
                description: group_feed.group.description,
                slug: group_feed.group.slug,
                feed: FeedContext::from_page(&group_feed.page),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .author_page(&username, &viewer, query.number())
        .await
    {
        Ok(author_feed) => {
            let is_self = viewer.username() == Some(author_feed.author.username.as_str());
            render_template_response(
                ProfileTemplate {
                    viewer: ViewerView::from_viewer(&viewer),
                    author_username: author_feed.author.username,
                    post_count: author_feed.post_count,
                    following: author_feed.following,
                    is_self,
                    feed: FeedContext::from_page(&author_feed.page),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(&viewer);
    };

    match state.feed.post_detail(id).await {
        Ok(Some(detail)) => {
            let is_author = viewer
                .user()
                .is_some_and(|user| user.id == detail.post.author_id);
            render_template_response(
                PostDetailTemplate {
                    viewer: ViewerView::from_viewer(&viewer),
                    post: PostCard::from_record(&detail.post),
                    author_post_count: detail.author_post_count,
                    is_author,
                    comments: detail
                        .comments
                        .iter()
                        .map(crate::presentation::views::CommentView::from_record)
                        .collect(),
                },
                StatusCode::OK,
            )
        }
        Ok(None) => render_not_found_response(&viewer),
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn create_post_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    if let Err(redirect) = require_user(&viewer, "/create/") {
        return redirect;
    }

    let groups = match state.groups.list_all().await {
        Ok(groups) => groups,
        Err(err) => {
            return repo_error_to_http("infra::http::create_post_form", err).into_response();
        }
    };

    render_template_response(
        PostFormTemplate {
            viewer: ViewerView::from_viewer(&viewer),
            is_edit: false,
            post_id: 0,
            text: String::new(),
            image: String::new(),
            options: group_options(&groups, None),
            errors: FormErrorsView::default(),
        },
        StatusCode::OK,
    )
}

async fn create_post_submit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<PostForm>,
) -> Response {
    let user = match require_user(&viewer, "/create/") {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let groups = match state.groups.list_all().await {
        Ok(groups) => groups,
        Err(err) => {
            return repo_error_to_http("infra::http::create_post_submit", err).into_response();
        }
    };

    let draft = match form.validate(&groups) {
        Ok(draft) => draft,
        Err(errors) => {
            let selected = form.group.trim().parse().ok();
            return render_template_response(
                PostFormTemplate {
                    viewer: ViewerView::from_viewer(&viewer),
                    is_edit: false,
                    post_id: 0,
                    text: form.text,
                    image: form.image,
                    options: group_options(&groups, selected),
                    errors: FormErrorsView::from(&errors),
                },
                StatusCode::OK,
            );
        }
    };

    match state.posts.create_post(user, draft).await {
        Ok(_) => Redirect::to(&profile_path(&user.username)).into_response(),
        Err(err) => post_error_to_response(err, &viewer),
    }
}

async fn edit_post_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(&viewer);
    };

    let user = match require_user(&viewer, &format!("/posts/{id}/edit/")) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let detail = match state.feed.post_detail(id).await {
        Ok(Some(detail)) => detail,
        Ok(None) => return render_not_found_response(&viewer),
        Err(err) => return feed_error_to_response(err, &viewer),
    };

    // Non-authors are sent back to the read view, never shown an error.
    if detail.post.author_id != user.id {
        return Redirect::to(&post_path(id)).into_response();
    }

    let groups = match state.groups.list_all().await {
        Ok(groups) => groups,
        Err(err) => {
            return repo_error_to_http("infra::http::edit_post_form", err).into_response();
        }
    };

    render_template_response(
        PostFormTemplate {
            viewer: ViewerView::from_viewer(&viewer),
            is_edit: true,
            post_id: id,
            text: detail.post.text,
            image: detail.post.image.unwrap_or_default(),
            options: group_options(&groups, detail.post.group_id),
            errors: FormErrorsView::default(),
        },
        StatusCode::OK,
    )
}

async fn edit_post_submit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(&viewer);
    };

    let user = match require_user(&viewer, &format!("/posts/{id}/edit/")) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    // Ownership is settled before the form is even looked at, so a
    // non-author always lands on the read view no matter what they posted.
    let existing = match state.feed.post_detail(id).await {
        Ok(Some(detail)) => detail.post,
        Ok(None) => return render_not_found_response(&viewer),
        Err(err) => return feed_error_to_response(err, &viewer),
    };
    if existing.author_id != user.id {
        return Redirect::to(&post_path(id)).into_response();
    }

    let groups = match state.groups.list_all().await {
        Ok(groups) => groups,
        Err(err) => {
            return repo_error_to_http("infra::http::edit_post_submit", err).into_response();
        }
    };

    let draft = match form.validate(&groups) {
        Ok(draft) => draft,
        Err(errors) => {
            let selected = form.group.trim().parse().ok();
            return render_template_response(
                PostFormTemplate {
                    viewer: ViewerView::from_viewer(&viewer),
                    is_edit: true,
                    post_id: id,
                    text: form.text,
                    image: form.image,
                    options: group_options(&groups, selected),
                    errors: FormErrorsView::from(&errors),
                },
                StatusCode::OK,
            );
        }
    };

    match state.posts.update_post(user, id, draft).await {
        Ok(MutationOutcome::Applied(_)) => Redirect::to(&post_path(id)).into_response(),
        Ok(MutationOutcome::NotAuthor { post_id }) => {
            Redirect::to(&post_path(post_id)).into_response()
        }
        Err(err) => post_error_to_response(err, &viewer),
    }
}

async fn delete_post(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(&viewer);
    };

    let user = match require_user(&viewer, &format!("/posts/{id}/delete/")) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.posts.delete_post(user, id).await {
        Ok(MutationOutcome::Applied(())) => Redirect::to("/").into_response(),
        Ok(MutationOutcome::NotAuthor { post_id }) => {
            Redirect::to(&post_path(post_id)).into_response()
        }
        Err(err) => post_error_to_response(err, &viewer),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(&viewer);
    };

    let user = match require_user(&viewer, &format!("/posts/{id}/comment/")) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    // Blank comments are dropped without feedback; either way the reader
    // lands back on the post.
    match state.posts.add_comment(user, id, &form.text).await {
        Ok(_) => Redirect::to(&post_path(id)).into_response(),
        Err(err) => post_error_to_response(err, &viewer),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Response {
    let user = match require_user(&viewer, "/follow/") {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.feed.subscription_page(user, query.number()).await {
        Ok(page) => render_template_response(
            FollowTemplate {
                viewer: ViewerView::from_viewer(&viewer),
                feed: FeedContext::from_page(&page),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn follow_author(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
) -> Response {
    let user = match require_user(&viewer, &format!("/profile/{username}/follow/")) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.follows.follow(user, &username).await {
        Ok(()) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => follow_error_to_response(err, &viewer),
    }
}

async fn unfollow_author(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
) -> Response {
    let user = match require_user(&viewer, &format!("/profile/{username}/unfollow/")) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.follows.unfollow(user, &username).await {
        Ok(()) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => follow_error_to_response(err, &viewer),
    }
}

async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback(Extension(viewer): Extension<Viewer>) -> Response {
    render_not_found_response(&viewer)
}

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::PostFormErrors;
use crate::application::pagination::FeedPage;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::identity::Viewer;

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[day] [month repr:short] [year]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: &Viewer) -> Response {
    let template = NotFoundTemplate {
        viewer: ViewerView::from_viewer(viewer),
    };
    let mut response = render_template_response(template, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct ViewerView {
    pub is_authenticated: bool,
    pub username: String,
}

impl ViewerView {
    pub fn from_viewer(viewer: &Viewer) -> Self {
        Self {
            is_authenticated: !viewer.is_anonymous(),
            username: viewer.username().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GroupLinkView {
    pub slug: String,
    pub title: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub published: String,
    pub author_username: String,
    pub group: Option<GroupLinkView>,
    pub image: Option<String>,
}

impl PostCard {
    pub fn from_record(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            published: format_date(post.published_at),
            author_username: post.author_username.clone(),
            group: match (post.group_slug.as_ref(), post.group_title.as_ref()) {
                (Some(slug), Some(title)) => Some(GroupLinkView {
                    slug: slug.clone(),
                    title: title.clone(),
                }),
                _ => None,
            },
            image: post.image.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub created: String,
    pub text: String,
}

impl CommentView {
    pub fn from_record(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            created: format_date(comment.created_at),
            text: comment.text.clone(),
        }
    }
}

/// Page navigation state threaded into the pagination partial.
#[derive(Clone)]
pub struct PaginationView {
    pub number: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: u32,
    pub next: u32,
}

impl PaginationView {
    pub fn from_page<T>(page: &FeedPage<T>) -> Self {
        Self {
            number: page.number,
            total_pages: page.total_pages,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous: page.number.saturating_sub(1).max(1),
            next: page.number.saturating_add(1).min(page.total_pages),
        }
    }
}

#[derive(Clone)]
pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub fn group_options(groups: &[GroupRecord], selected: Option<i64>) -> Vec<GroupOptionView> {
    groups
        .iter()
        .map(|group| GroupOptionView {
            id: group.id,
            title: group.title.clone(),
            selected: selected == Some(group.id),
        })
        .collect()
}

#[derive(Clone, Default)]
pub struct FormErrorsView {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
}

impl From<&PostFormErrors> for FormErrorsView {
    fn from(errors: &PostFormErrors) -> Self {
        Self {
            text: errors.text,
            group: errors.group,
        }
    }
}

pub struct FeedContext {
    pub posts: Vec<PostCard>,
    pub has_results: bool,
    pub pagination: PaginationView,
}

impl FeedContext {
    pub fn from_page(page: &FeedPage<PostRecord>) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from_record).collect(),
            has_results: !page.items.is_empty(),
            pagination: PaginationView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub viewer: ViewerView,
    pub feed: FeedContext,
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub viewer: ViewerView,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub feed: FeedContext,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub viewer: ViewerView,
    pub author_username: String,
    pub post_count: u64,
    pub following: bool,
    pub is_self: bool,
    pub feed: FeedContext,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: ViewerView,
    pub post: PostCard,
    pub author_post_count: u64,
    pub is_author: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub viewer: ViewerView,
    pub is_edit: bool,
    pub post_id: i64,
    pub text: String,
    pub image: String,
    pub options: Vec<GroupOptionView>,
    pub errors: FormErrorsView,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub viewer: ViewerView,
    pub feed: FeedContext,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub viewer: ViewerView,
    pub next: String,
    pub error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub viewer: ViewerView,
}

fn format_date(at: OffsetDateTime) -> String {
    at.format(&DATE_FORMAT)
        .unwrap_or_else(|_| at.date().to_string())
}

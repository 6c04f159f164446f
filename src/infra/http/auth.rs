//! Minimal cookie identity.
//!
//! The session cookie carries the username verbatim; the viewer middleware
//! resolves it against the accounts table on every request. There is no
//! password flow: logging in is claiming an existing username.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::application::error::HttpError;
use crate::domain::identity::{Viewer, validate_username};
use crate::presentation::views::{LoginTemplate, ViewerView, render_template_response};

use super::public::HttpState;

pub const SESSION_COOKIE: &str = "brusio_session";

const LOGIN_PATH: &str = "/auth/login/";

/// Extract the claimed username from the session cookie, if any.
pub(super) fn session_username(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// A return path is only honoured when it is a local absolute path;
/// anything else falls back to the front page.
pub(super) fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

/// Redirect an anonymous mutation attempt to the login form, preserving the
/// requested path so a successful login can return there.
pub(super) fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("{LOGIN_PATH}?next={next}")).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    next: String,
}

pub(super) async fn login_form(
    axum::Extension(viewer): axum::Extension<Viewer>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let next = query.next.as_deref().unwrap_or("/");
    render_template_response(
        LoginTemplate {
            viewer: ViewerView::from_viewer(&viewer),
            next: safe_next(next).to_string(),
            error: None,
        },
        StatusCode::OK,
    )
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    axum::extract::Form(form): axum::extract::Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    let next = safe_next(&form.next);

    let rejected = |error: &'static str| {
        render_template_response(
            LoginTemplate {
                viewer: ViewerView::from_viewer(&Viewer::anonymous()),
                next: next.to_string(),
                error: Some(error),
            },
            StatusCode::OK,
        )
    };

    if validate_username(username).is_err() {
        return rejected("That username is not valid");
    }

    match state.users.find_by_username(username).await {
        Ok(Some(user)) => {
            info!(username = %user.username, "session opened");
            let mut response = Redirect::to(next).into_response();
            set_session_cookie(&mut response, &user.username);
            response
        }
        Ok(None) => rejected("No account with that username"),
        Err(err) => HttpError::from_error(
            "infra::http::auth::login_submit",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn logout(axum::Extension(viewer): axum::Extension<Viewer>) -> Response {
    if let Some(username) = viewer.username() {
        info!(username, "session closed");
    }
    let mut response = Redirect::to("/").into_response();
    clear_session_cookie(&mut response);
    response
}

fn set_session_cookie(response: &mut Response, username: &str) {
    // validate_username keeps the value header-safe
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={username}; Path=/; HttpOnly; SameSite=Lax"
    )) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
}

fn clear_session_cookie(response: &mut Response) {
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    )) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
}

//! Mutation routes: authentication gates, the author-only guard, comments
//! and follow toggles.

mod common;

use axum::http::{StatusCode, header};
use common::{MemoryRepos, app, body_text, get, location, post_form, post_form_as};
use tower::ServiceExt;

#[tokio::test]
async fn anonymous_create_redirects_to_login_with_return_path() {
    let repos = MemoryRepos::new();
    let response = app(&repos)
        .oneshot(post_form("/create/", "text=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some("/auth/login/?next=/create/")
    );
    assert_eq!(repos.post_count(), 0);
}

#[tokio::test]
async fn create_post_redirects_to_author_profile() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");
    let response = app(&repos)
        .oneshot(post_form_as("/create/", "text=a+fresh+post&group=", "leo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/profile/leo/"));
    assert_eq!(repos.post_count(), 1);
}

#[tokio::test]
async fn blank_post_text_re_renders_form_with_error() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");
    let response = app(&repos)
        .oneshot(post_form_as("/create/", "text=++&group=", "leo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Post text must not be empty"));
    assert_eq!(repos.post_count(), 0);
}

#[tokio::test]
async fn create_post_files_it_under_the_chosen_group() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");
    let cats = repos.seed_group("Cats", "cats");
    let response = app(&repos)
        .oneshot(post_form_as(
            "/create/",
            &format!("text=about+cats&group={}", cats.id),
            "leo",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let feed = app(&repos).oneshot(get("/group/cats/")).await.unwrap();
    let html = body_text(feed).await;
    assert!(html.contains("about cats"));
}

#[tokio::test]
async fn non_author_edit_redirects_and_leaves_post_untouched() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    repos.seed_user("mia");
    let post = repos.seed_post(&leo, None, "original text");

    let response = app(&repos)
        .oneshot(post_form_as(
            &format!("/posts/{}/edit/", post.id),
            "text=hijacked&group=",
            "mia",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/posts/{}/", post.id)).as_deref()
    );
    assert_eq!(repos.post_text(post.id).as_deref(), Some("original text"));
}

#[tokio::test]
async fn non_author_edit_redirects_even_when_the_form_is_invalid() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    repos.seed_user("mia");
    let post = repos.seed_post(&leo, None, "original text");

    // Blank text would re-render the form for the author; a non-author
    // must get the detail-view redirect before validation ever runs.
    let response = app(&repos)
        .oneshot(post_form_as(
            &format!("/posts/{}/edit/", post.id),
            "text=&group=",
            "mia",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/posts/{}/", post.id)).as_deref()
    );
    assert_eq!(repos.post_text(post.id).as_deref(), Some("original text"));
}

#[tokio::test]
async fn author_edit_applies_and_redirects_to_detail() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    let post = repos.seed_post(&leo, None, "original text");

    let response = app(&repos)
        .oneshot(post_form_as(
            &format!("/posts/{}/edit/", post.id),
            "text=revised+text&group=",
            "leo",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/posts/{}/", post.id)).as_deref()
    );
    assert_eq!(repos.post_text(post.id).as_deref(), Some("revised text"));
}

#[tokio::test]
async fn non_author_cannot_open_the_edit_form() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    repos.seed_user("mia");
    let post = repos.seed_post(&leo, None, "original text");

    let response = app(&repos)
        .oneshot(common::get_as(&format!("/posts/{}/edit/", post.id), "mia"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/posts/{}/", post.id)).as_deref()
    );
}

#[tokio::test]
async fn author_delete_removes_post_and_returns_home() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    let post = repos.seed_post(&leo, None, "doomed post");

    let response = app(&repos)
        .oneshot(post_form_as(&format!("/posts/{}/delete/", post.id), "", "leo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
    assert_eq!(repos.post_count(), 0);
}

#[tokio::test]
async fn non_author_delete_redirects_without_deleting() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    repos.seed_user("mia");
    let post = repos.seed_post(&leo, None, "still here");

    let response = app(&repos)
        .oneshot(post_form_as(&format!("/posts/{}/delete/", post.id), "", "mia"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/posts/{}/", post.id)).as_deref()
    );
    assert_eq!(repos.post_count(), 1);
}

#[tokio::test]
async fn comment_is_stored_and_redirects_to_detail() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    let post = repos.seed_post(&leo, None, "a post");

    let response = app(&repos)
        .oneshot(post_form_as(
            &format!("/posts/{}/comment/", post.id),
            "text=nice+one",
            "leo",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/posts/{}/", post.id)).as_deref()
    );
    assert_eq!(repos.comment_count(post.id), 1);
}

#[tokio::test]
async fn blank_comment_is_dropped_silently() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    let post = repos.seed_post(&leo, None, "a post");

    let response = app(&repos)
        .oneshot(post_form_as(
            &format!("/posts/{}/comment/", post.id),
            "text=+++",
            "leo",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(repos.comment_count(post.id), 0);
}

#[tokio::test]
async fn anonymous_comment_redirects_to_login() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    let post = repos.seed_post(&leo, None, "a post");

    let response = app(&repos)
        .oneshot(post_form(
            &format!("/posts/{}/comment/", post.id),
            "text=drive-by",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/auth/login/?next=/posts/{}/comment/", post.id)).as_deref()
    );
    assert_eq!(repos.comment_count(post.id), 0);
}

#[tokio::test]
async fn follow_and_unfollow_toggle_the_relation() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");
    let mia = repos.seed_user("mia");

    let response = app(&repos)
        .oneshot(post_form_as("/profile/mia/follow/", "", "leo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/profile/mia/"));
    assert!(repos.follow_exists(leo.id, mia.id));

    let response = app(&repos)
        .oneshot(post_form_as("/profile/mia/unfollow/", "", "leo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(!repos.follow_exists(leo.id, mia.id));
}

#[tokio::test]
async fn self_follow_is_a_no_op() {
    let repos = MemoryRepos::new();
    let leo = repos.seed_user("leo");

    let response = app(&repos)
        .oneshot(post_form_as("/profile/leo/follow/", "", "leo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(!repos.follow_exists(leo.id, leo.id));
}

#[tokio::test]
async fn unfollowing_an_absent_relation_succeeds() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");
    repos.seed_user("mia");

    let response = app(&repos)
        .oneshot(post_form_as("/profile/mia/unfollow/", "", "leo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/profile/mia/"));
}

#[tokio::test]
async fn login_sets_session_cookie_and_honours_next() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");

    let response = app(&repos)
        .oneshot(post_form("/auth/login/", "username=leo&next=/create/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/create/"));
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie set");
    assert!(cookie.starts_with("brusio_session=leo"));
}

#[tokio::test]
async fn login_with_unknown_username_re_renders_form() {
    let repos = MemoryRepos::new();
    let response = app(&repos)
        .oneshot(post_form("/auth/login/", "username=ghost&next=/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let html = body_text(response).await;
    assert!(html.contains("No account with that username"));
}

#[tokio::test]
async fn login_next_never_leaves_the_site() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");

    let response = app(&repos)
        .oneshot(post_form(
            "/auth/login/",
            "username=leo&next=https://evil.example",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let repos = MemoryRepos::new();
    repos.seed_user("leo");

    let response = app(&repos)
        .oneshot(post_form_as("/auth/logout/", "", "leo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("cookie cleared");
    assert!(cookie.contains("Max-Age=0"));
}

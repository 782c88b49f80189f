//! Page Tests
//!
//! Covers home, explore, reels, search, profiles and post management.

mod common;

use axum::http::StatusCode;
use common::{app, Part};
use uuid::Uuid;

fn ids(posts: &serde_json::Value) -> Vec<String> {
    posts
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|post| post["id"].as_str().map(str::to_string))
        .collect()
}

// ===========================================================================
// Feeds
// ===========================================================================

#[tokio::test]
async fn home_reports_viewer_likes_and_comments() {
    let app = app().await;
    let author = app.create_user("home_author").await;
    let viewer = app.create_user("home_viewer").await;
    let post_id = app.create_post_for_user(author.id, "home.jpg").await;

    app.post_form(&format!("/api/like/{}", post_id), &[], Some(&viewer.access_token))
        .await;
    app.post_form(
        &format!("/api/comment/{}", post_id),
        &[("text", "first")],
        Some(&viewer.access_token),
    )
    .await;
    app.post_form(
        &format!("/api/follow/{}", author.username),
        &[],
        Some(&viewer.access_token),
    )
    .await;

    let resp = app.get("/", Some(&viewer.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let post = body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|post| post["id"] == post_id.to_string())
        .cloned()
        .expect("post on home");
    assert_eq!(post["liked_by_viewer"], true);
    assert_eq!(post["like_count"], 1);
    assert_eq!(post["comment_count"], 1);
    assert_eq!(post["comments"][0]["text"], "first");
    assert_eq!(post["author"]["username"], author.username.as_str());
    assert!(body["following_ids"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!(author.id)));
}

#[tokio::test]
async fn reels_only_lists_videos() {
    let app = app().await;
    let author = app.create_user("reels_author").await;
    let video = app.create_post_for_user(author.id, "clip.MP4").await;
    let photo = app.create_post_for_user(author.id, "still.png").await;

    let resp = app.get("/reels", Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let reel_ids = ids(&body["posts"]);
    assert!(reel_ids.contains(&video.to_string()));
    assert!(!reel_ids.contains(&photo.to_string()));
    assert!(body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .all(|post| post["is_video"] == true));

    let explore = app.get("/explore", Some(&author.access_token)).await.json();
    let explore_ids = ids(&explore["posts"]);
    assert!(explore_ids.contains(&video.to_string()));
    assert!(explore_ids.contains(&photo.to_string()));
}

// ===========================================================================
// Search
// ===========================================================================

#[tokio::test]
async fn empty_search_has_no_results_list() {
    let app = app().await;
    let user = app.create_user("search_empty").await;

    let resp = app.get("/search?q=%20%20", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["users"].is_null());
}

#[tokio::test]
async fn search_matches_usernames_case_insensitively() {
    let app = app().await;
    let user = app.create_user("searchable_Zed").await;

    let resp = app.get("/search?q=SEARCHABLE_z", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let users = resp.json()["users"].clone();
    assert_eq!(users[0]["username"], user.username.as_str());

    // A bare wildcard only matches literally.
    let resp = app.get("/search?q=%25", Some(&user.access_token)).await;
    assert_eq!(resp.json()["users"], serde_json::json!([]));
}

// ===========================================================================
// Profiles
// ===========================================================================

#[tokio::test]
async fn profile_splits_media_and_reports_stats() {
    let app = app().await;
    let owner = app.create_user("profile_owner").await;
    let visitor = app.create_user("profile_visitor").await;
    app.create_post_for_user(owner.id, "a.jpg").await;
    app.create_post_for_user(owner.id, "b.webm").await;

    let path = format!("/profile/{}", owner.username);
    let resp = app.get(&path, Some(&visitor.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["photos"].as_array().unwrap().len(), 1);
    assert_eq!(body["videos"].as_array().unwrap().len(), 1);
    assert_eq!(body["stats"]["posts"], 2);
    assert_eq!(body["is_following"], false);
    assert_eq!(body["user"]["avatar_url"], "/static/core/default-avatar.svg");

    let own = app.get(&path, Some(&owner.access_token)).await.json();
    assert!(own["is_following"].is_null());
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let app = app().await;
    let user = app.create_user("profile_missing").await;

    let resp = app.get("/profile/no_such_user", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_owner_can_edit_a_profile() {
    let app = app().await;
    let owner = app.create_user("edit_owner").await;
    let other = app.create_user("edit_other").await;
    let path = format!("/profile/{}/edit", owner.username);

    let resp = app
        .post_multipart(&path, &[Part::text("bio", "hijacked")], Some(&other.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let long_bio = "b".repeat(161);
    let resp = app
        .post_multipart(&path, &[Part::text("bio", &long_bio)], Some(&owner.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_multipart(&path, &[Part::text("bio", "hello there")], Some(&owner.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some(format!("/profile/{}", owner.username).as_str()));

    let profile = app
        .get(&format!("/profile/{}", owner.username), Some(&owner.access_token))
        .await
        .json();
    assert_eq!(profile["bio"], "hello there");
}

// ===========================================================================
// Posts
// ===========================================================================

#[tokio::test]
async fn create_post_validates_media() {
    let app = app().await;
    let user = app.create_user("create_invalid").await;

    let resp = app
        .post_multipart("/create", &[Part::text("caption", "no media")], Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_multipart(
            "/create",
            &[Part::file("media", "notes.txt", b"plain text")],
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn created_post_keeps_its_uploaded_media() {
    let app = app().await;
    let user = app.create_user("create_stored").await;
    app.media_bucket().await;

    let resp = app
        .post_multipart(
            "/create",
            &[Part::text("caption", "sunset"), Part::file("media", "sunset.jpg", b"jpeg bytes")],
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    let media_key: String = sqlx::query_scalar("SELECT media_key FROM posts WHERE author_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    let stored = app.stored_keys(&format!("posts/{}/", user.id)).await;
    assert_eq!(stored, vec![media_key]);
}

#[tokio::test]
async fn failed_post_insert_discards_uploaded_media() {
    let app = app().await;
    let user = app.create_user("create_orphan").await;
    app.media_bucket().await;

    // The token outlives the account, so the upload succeeds and the insert fails.
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app
        .post_multipart(
            "/create",
            &[Part::file("media", "orphan.jpg", b"jpeg bytes")],
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.stored_keys(&format!("posts/{}/", user.id)).await.is_empty());
}

#[tokio::test]
async fn only_the_author_can_delete_a_post() {
    let app = app().await;
    let author = app.create_user("delete_author").await;
    let other = app.create_user("delete_other").await;
    let post_id = app.create_post_for_user(author.id, "gone.jpg").await;
    let path = format!("/post/delete/{}", post_id);

    let resp = app.post_form(&path, &[], Some(&other.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.post_form(&path, &[], Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some(format!("/profile/{}", author.username).as_str()));

    let resp = app.post_form(&path, &[], Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .post_form(&format!("/post/delete/{}", Uuid::new_v4()), &[], Some(&author.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_status() {
    let app = app().await;

    let resp = app.get("/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, SignupInput, TokenPair, MAX_PASSWORD_LEN};
use crate::app::engagement::EngagementService;
use crate::app::feed::{FeedPost, FeedService};
use crate::app::media::{MediaFolder, MediaService};
use crate::app::messaging::MessagingService;
use crate::app::notifications::{NotificationService, NOTIFICATION_PAGE_SIZE};
use crate::app::posts::PostService;
use crate::app::search::{SearchService, SEARCH_LIMIT};
use crate::app::social::SocialService;
use crate::app::stories::StoryService;
use crate::app::users::{AvatarChange, UserService};
use crate::domain::engagement::{LikeToggle, MAX_COMMENT_LEN};
use crate::domain::messaging::{Message, ThreadSummary};
use crate::domain::notification::Notification;
use crate::domain::post::{MediaKind, PostCard, MAX_CAPTION_LEN};
use crate::domain::realtime::format_timestamp;
use crate::domain::social_graph::FollowToggle;
use crate::domain::story::StoryRing;
use crate::domain::user::{ProfileStats, UserSummary, MAX_BIO_LEN};
use crate::http::auth::REFRESH_COOKIE;
use crate::http::forms::{cleared_cookies, session_cookies, MultipartForm};
use crate::http::{AppError, AuthUser};
use crate::infra::db::is_unique_violation;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.db.clone(), state.storage.clone())
}

fn notification_service(state: &AppState) -> NotificationService {
    NotificationService::new(state.db.clone(), state.storage.clone(), state.broker.clone())
}

fn messaging_service(state: &AppState) -> MessagingService {
    MessagingService::new(state.db.clone(), state.storage.clone(), state.broker.clone())
}

/// Parses an id submitted in a form or query string: absent is a client
/// error, anything that names no record is a miss.
fn parse_submitted_id(raw: Option<&str>, missing: &str, invalid: &str) -> Result<Uuid, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request(missing))?;
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(invalid))
}

async fn viewer_summary(state: &AppState, user_id: Uuid) -> Result<UserSummary, AppError> {
    user_service(state)
        .get_summary(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to load viewer");
            AppError::internal("failed to load user")
        })?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))
}

async fn find_user(state: &AppState, username: &str) -> Result<crate::domain::user::User, AppError> {
    user_service(state)
        .find_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to load user");
            AppError::internal("failed to load user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

/// Pushes a notification; failures never fail the triggering request.
async fn notify(state: &AppState, user_id: Uuid, actor_id: Uuid, title: &str, text: &str) {
    if let Err(err) = notification_service(state)
        .push(user_id, Some(actor_id), title, text)
        .await
    {
        tracing::warn!(error = ?err, user_id = %user_id, actor_id = %actor_id, "failed to push notification");
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<&TokenPair> for AuthTokenResponse {
    fn from(tokens: &TokenPair) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

/// `303 /` with the session cookies set and the token pair in the body.
fn session_redirect(tokens: &TokenPair, secure: bool) -> Response {
    let cookies = session_cookies(tokens, secure)
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie));
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/")],
        AppendHeaders(cookies),
        Json(AuthTokenResponse::from(tokens)),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if viewer.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let input = SignupInput {
        username: form.username,
        email: form.email,
        password: form.password,
        confirm_password: form.confirm_password,
    };
    input.validate().map_err(AppError::bad_request)?;

    let service = auth_service(&state);
    let user = match service.signup(&input).await {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err, "users_username_key") => {
            return Err(AppError::conflict("A user with that username already exists."));
        }
        Err(err) => {
            tracing::error!(error = ?err, "failed to create user");
            return Err(AppError::internal("failed to create user"));
        }
    };

    let tokens = service.issue_token_pair(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to issue session");
        AppError::internal("failed to sign in")
    })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok(session_redirect(&tokens, state.cookie_secure))
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let identifier = form.username.trim();
    if identifier.is_empty() || form.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if form.password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = auth_service(&state)
        .login(identifier, &form.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(session_redirect(&tokens, state.cookie_secure)),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(refresh_token) = crate::http::auth::cookie_value(&headers, REFRESH_COOKIE) {
        auth_service(&state)
            .revoke_refresh_token(&refresh_token)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to revoke refresh token");
                AppError::internal("failed to logout")
            })?;
    }

    let cookies = cleared_cookies(state.cookie_secure)
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie));
    Ok((AppendHeaders(cookies), Redirect::to("/login")).into_response())
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Response, AppError> {
    let refresh_token = payload
        .map(|Json(payload)| payload.refresh_token)
        .or_else(|| crate::http::auth::cookie_value(&headers, REFRESH_COOKIE))
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("refresh_token is required"))?;

    let tokens = auth_service(&state)
        .refresh(&refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?
        .ok_or_else(|| AppError::unauthorized("invalid refresh token"))?;

    let cookies = session_cookies(&tokens, state.cookie_secure)
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie));
    Ok((AppendHeaders(cookies), Json(AuthTokenResponse::from(&tokens))).into_response())
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HomePage {
    pub posts: Vec<FeedPost>,
    pub stories: Vec<StoryRing>,
    pub following_ids: Vec<Uuid>,
}

pub async fn home(State(state): State<AppState>, auth: AuthUser) -> Result<Json<HomePage>, AppError> {
    let feed = FeedService::new(state.db.clone(), state.storage.clone());
    let posts = feed.home(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load home feed");
        AppError::internal("failed to load feed")
    })?;

    let stories = StoryService::new(state.db.clone(), state.storage.clone())
        .story_rings(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load stories");
            AppError::internal("failed to load stories")
        })?;

    let following_ids = SocialService::new(state.db.clone())
        .following_ids(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load following");
            AppError::internal("failed to load following")
        })?;

    Ok(Json(HomePage {
        posts,
        stories,
        following_ids,
    }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SearchPage {
    pub q: String,
    /// `None` until a query is entered, so "no results" is distinguishable.
    pub users: Option<Vec<UserSummary>>,
}

pub async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>, AppError> {
    let q = query.q.unwrap_or_default().trim().to_string();
    if q.is_empty() {
        return Ok(Json(SearchPage { q, users: None }));
    }

    let users = SearchService::new(state.db.clone(), state.storage.clone())
        .search_users(&q, None, SEARCH_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to search users");
            AppError::internal("failed to search users")
        })?;

    Ok(Json(SearchPage {
        q,
        users: Some(users),
    }))
}

#[derive(Serialize)]
pub struct PostGridPage {
    pub posts: Vec<PostCard>,
}

pub async fn explore(State(state): State<AppState>, auth: AuthUser) -> Result<Json<PostGridPage>, AppError> {
    let posts = FeedService::new(state.db.clone(), state.storage.clone())
        .explore()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load explore");
            AppError::internal("failed to load explore")
        })?;
    Ok(Json(PostGridPage { posts }))
}

pub async fn reels(State(state): State<AppState>, auth: AuthUser) -> Result<Json<PostGridPage>, AppError> {
    let posts = FeedService::new(state.db.clone(), state.storage.clone())
        .reels()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load reels");
            AppError::internal("failed to load reels")
        })?;
    Ok(Json(PostGridPage { posts }))
}

#[derive(Serialize)]
pub struct ProfilePage {
    pub user: UserSummary,
    pub bio: String,
    pub photos: Vec<PostCard>,
    pub videos: Vec<PostCard>,
    pub stats: ProfileStats,
    /// `None` on the viewer's own profile.
    pub is_following: Option<bool>,
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfilePage>, AppError> {
    let user = find_user(&state, &username).await?;
    let users = user_service(&state);

    let profile = users.get_profile(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to load profile");
        AppError::internal("failed to load profile")
    })?;
    let stats = users.stats(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to load profile stats");
        AppError::internal("failed to load profile")
    })?;
    let posts = FeedService::new(state.db.clone(), state.storage.clone())
        .by_author(user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.id, "failed to load profile posts");
            AppError::internal("failed to load profile")
        })?;

    let is_following = if user.id == auth.user_id {
        None
    } else {
        let following = SocialService::new(state.db.clone())
            .is_following(auth.user_id, user.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load follow state");
                AppError::internal("failed to load profile")
            })?;
        Some(following)
    };

    let (videos, photos): (Vec<PostCard>, Vec<PostCard>) =
        posts.into_iter().partition(|post| post.is_video);
    let avatar_url = users.avatar_url(profile.avatar_key.as_deref());

    Ok(Json(ProfilePage {
        user: UserSummary::new(user.id, user.username, avatar_url),
        bio: profile.bio,
        photos,
        videos,
        stats,
        is_following,
    }))
}

pub async fn edit_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let user = find_user(&state, &username).await?;
    if user.id != auth.user_id {
        return Err(AppError::forbidden("you can only edit your own profile"));
    }

    let mut form = MultipartForm::read(multipart).await?;
    let bio = form.text("bio").map(|bio| bio.trim().to_string());
    if let Some(bio) = &bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(AppError::bad_request("bio must be at most 160 characters"));
        }
    }

    let clear_avatar = form.has_flag("avatar-clear");
    let avatar = match form.take_file("avatar") {
        Some(_) if clear_avatar => {
            return Err(AppError::bad_request(
                "Please either submit a file or check the clear checkbox, not both.",
            ));
        }
        Some(file) => {
            if file.kind() != Some(MediaKind::Image) {
                return Err(AppError::bad_request("avatar must be an image"));
            }
            let key = MediaService::new(state.storage.clone())
                .store(MediaFolder::Avatars, auth.user_id, &file)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, user_id = %auth.user_id, "failed to store avatar");
                    AppError::internal("failed to store avatar")
                })?;
            AvatarChange::Replace(key)
        }
        None if clear_avatar => AvatarChange::Clear,
        None => AvatarChange::Keep,
    };

    let new_key = match &avatar {
        AvatarChange::Replace(key) => Some(key.clone()),
        _ => None,
    };
    let replaced = match user_service(&state)
        .update_profile(auth.user_id, bio, avatar)
        .await
    {
        Ok(replaced) => replaced,
        Err(err) => {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            if let Some(key) = new_key {
                MediaService::new(state.storage.clone()).remove(&key).await;
            }
            return Err(AppError::internal("failed to update profile"));
        }
    };
    if let Some(old_key) = replaced {
        MediaService::new(state.storage.clone()).remove(&old_key).await;
    }

    Ok(Redirect::to(&format!("/profile/{}", user.username)))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let caption = form.text("caption").unwrap_or_default().trim().to_string();
    if caption.chars().count() > MAX_CAPTION_LEN {
        return Err(AppError::bad_request("caption must be at most 2200 characters"));
    }
    let file = form
        .take_file("media")
        .ok_or_else(|| AppError::bad_request("media is required"))?;
    if file.kind().is_none() {
        return Err(AppError::bad_request("unsupported media type"));
    }

    let key = MediaService::new(state.storage.clone())
        .store(MediaFolder::Posts, auth.user_id, &file)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to store post media");
            AppError::internal("failed to store media")
        })?;

    let post = match PostService::new(state.db.clone())
        .create_post(auth.user_id, &caption, &key)
        .await
    {
        Ok(post) => post,
        Err(err) => {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            MediaService::new(state.storage.clone()).remove(&key).await;
            return Err(AppError::internal("failed to create post"));
        }
    };

    tracing::info!(post_id = %post.id, user_id = %auth.user_id, video = post.is_video(), "post created");
    notify(&state, auth.user_id, auth.user_id, "Post uploaded", "You posted new content.").await;

    Ok(Redirect::to("/"))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let posts = PostService::new(state.db.clone());
    let post = posts
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to load post");
            AppError::internal("failed to delete post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    if post.author_id != auth.user_id {
        return Err(AppError::forbidden("you can only delete your own posts"));
    }

    let deleted = posts.delete_post(post_id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, user_id = %auth.user_id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;
    if !deleted {
        return Err(AppError::not_found("post not found"));
    }
    MediaService::new(state.storage.clone()).remove(&post.media_key).await;

    let viewer = viewer_summary(&state, auth.user_id).await?;
    Ok(Redirect::to(&format!("/profile/{}", viewer.username)))
}

// ---------------------------------------------------------------------------
// Likes, comments, follows
// ---------------------------------------------------------------------------

pub async fn like_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeToggle>, AppError> {
    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to load post");
            AppError::internal("failed to like post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let toggle = EngagementService::new(state.db.clone(), state.storage.clone())
        .toggle_like(auth.user_id, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, user_id = %auth.user_id, "failed to toggle like");
            AppError::internal("failed to like post")
        })?;

    if toggle.liked && post.author_id != auth.user_id {
        let viewer = viewer_summary(&state, auth.user_id).await?;
        let text = format!("{} liked your post.", viewer.username);
        notify(&state, post.author_id, auth.user_id, "New like", &text).await;
    }

    Ok(Json(toggle))
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: String,
    pub count: i64,
}

pub async fn comment_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
    Form(form): Form<CommentForm>,
) -> Result<Json<CommentResponse>, AppError> {
    let text = form.text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Empty comment"));
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment must be at most 300 characters"));
    }

    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to load post");
            AppError::internal("failed to comment")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let engagement = EngagementService::new(state.db.clone(), state.storage.clone());
    let comment = engagement
        .add_comment(auth.user_id, post_id, text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, user_id = %auth.user_id, "failed to comment");
            AppError::internal("failed to comment")
        })?;
    let count = engagement.comment_count(post_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to count comments");
        AppError::internal("failed to comment")
    })?;

    if post.author_id != auth.user_id {
        let message = format!("{} commented: \"{}\"", comment.author.username, comment.text);
        notify(&state, post.author_id, auth.user_id, "New comment", &message).await;
    }

    Ok(Json(CommentResponse {
        id: comment.id,
        author: comment.author.username,
        text: comment.text,
        created_at: format_timestamp(comment.created_at),
        count,
    }))
}

pub async fn follow_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<FollowToggle>, AppError> {
    let target = find_user(&state, &username).await?;
    if target.id == auth.user_id {
        return Err(AppError::bad_request("Can't follow yourself"));
    }

    let toggle = SocialService::new(state.db.clone())
        .toggle_follow(auth.user_id, target.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, target_id = %target.id, "failed to toggle follow");
            AppError::internal("failed to follow user")
        })?;

    if toggle.following {
        let viewer = viewer_summary(&state, auth.user_id).await?;
        let text = format!("{} started following you.", viewer.username);
        notify(&state, target.id, auth.user_id, "New follower", &text).await;
    }

    Ok(Json(toggle))
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

pub async fn start_thread(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Redirect, AppError> {
    let other = find_user(&state, &username).await?;
    if other.id == auth.user_id {
        return Err(AppError::bad_request("You can't start a thread with yourself."));
    }

    let thread_id = messaging_service(&state)
        .find_or_create_thread(auth.user_id, other.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, other_id = %other.id, "failed to start thread");
            AppError::internal("failed to start thread")
        })?;

    Ok(Redirect::to(&format!("/messages?t={}", thread_id)))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub t: Option<String>,
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct MessagesPage {
    pub threads: Vec<ThreadSummary>,
    pub q: String,
    pub results: Option<Vec<UserSummary>>,
    pub selected_thread: Option<ThreadSummary>,
    pub messages: Vec<Message>,
    pub chat_partner: Option<UserSummary>,
}

pub async fn messages_page(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesPage>, AppError> {
    let messaging = messaging_service(&state);
    let threads = messaging.threads_for(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load threads");
        AppError::internal("failed to load messages")
    })?;

    let q = query.q.unwrap_or_default().trim().to_string();
    if !q.is_empty() {
        let results = SearchService::new(state.db.clone(), state.storage.clone())
            .search_users(&q, Some(auth.user_id), SEARCH_LIMIT)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %auth.user_id, "failed to search users");
                AppError::internal("failed to search users")
            })?;
        return Ok(Json(MessagesPage {
            threads,
            q,
            results: Some(results),
            selected_thread: None,
            messages: Vec::new(),
            chat_partner: None,
        }));
    }

    let requested = query.t.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let selected = match requested {
        Some(raw) => {
            let thread_id =
                Uuid::parse_str(raw).map_err(|_| AppError::not_found("thread not found"))?;
            let thread = messaging
                .get_thread(thread_id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, thread_id = %thread_id, "failed to load thread");
                    AppError::internal("failed to load messages")
                })?
                .ok_or_else(|| AppError::not_found("thread not found"))?;
            if !thread.includes(auth.user_id) {
                return Err(AppError::forbidden("Not allowed"));
            }
            Some(thread)
        }
        None => threads.first().cloned(),
    };

    let messages = match &selected {
        Some(thread) => messaging.list_messages(thread.id).await.map_err(|err| {
            tracing::error!(error = ?err, thread_id = %thread.id, "failed to load thread messages");
            AppError::internal("failed to load messages")
        })?,
        None => Vec::new(),
    };
    let chat_partner = selected
        .as_ref()
        .and_then(|thread| thread.partner_of(auth.user_id))
        .cloned();

    Ok(Json(MessagesPage {
        threads,
        q,
        results: None,
        selected_thread: selected,
        messages,
        chat_partner,
    }))
}

#[derive(Serialize)]
pub struct UploadedMessageResponse {
    pub id: Uuid,
    pub sender: String,
    pub text: String,
    pub created_at: String,
    pub attachment_url: Option<String>,
}

pub async fn upload_message(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<UploadedMessageResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let thread_id = parse_submitted_id(form.text("thread_id"), "missing thread_id", "invalid thread")?;

    let messaging = messaging_service(&state);
    let thread = messaging
        .get_thread(thread_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, thread_id = %thread_id, "failed to load thread");
            AppError::internal("failed to send message")
        })?
        .ok_or_else(|| AppError::not_found("invalid thread"))?;
    if !thread.includes(auth.user_id) {
        return Err(AppError::forbidden("Not allowed"));
    }

    let text = form.text("text").unwrap_or_default().trim().to_string();
    let file = form.take_file("file");
    if text.is_empty() && file.is_none() {
        return Err(AppError::bad_request("message needs text or a file"));
    }

    let attachment_key = match &file {
        Some(file) => Some(
            MediaService::new(state.storage.clone())
                .store(MediaFolder::Attachments, auth.user_id, file)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, thread_id = %thread_id, user_id = %auth.user_id, "failed to store attachment");
                    AppError::internal("failed to store attachment")
                })?,
        ),
        None => None,
    };

    let sent = messaging
        .send_message(thread_id, auth.user_id, &text, attachment_key.as_deref())
        .await;
    let message = match sent {
        Ok(Some(message)) => message,
        failed => {
            if let Some(key) = &attachment_key {
                MediaService::new(state.storage.clone()).remove(key).await;
            }
            return Err(match failed {
                Err(err) => {
                    tracing::error!(error = ?err, thread_id = %thread_id, user_id = %auth.user_id, "failed to send message");
                    AppError::internal("failed to send message")
                }
                _ => AppError::forbidden("Not allowed"),
            });
        }
    };

    Ok(Json(UploadedMessageResponse {
        id: message.id,
        sender: message.sender.username,
        text: message.text,
        created_at: format_timestamp(message.created_at),
        attachment_url: message.attachment_url,
    }))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NotificationsPage {
    pub notifications: Vec<Notification>,
    pub unseen_count: i64,
}

pub async fn notifications_page(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<NotificationsPage>, AppError> {
    let service = notification_service(&state);
    let notifications = service
        .list(auth.user_id, NOTIFICATION_PAGE_SIZE)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;
    let unseen_count = service.unseen_count(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to count notifications");
        AppError::internal("failed to list notifications")
    })?;

    Ok(Json(NotificationsPage {
        notifications,
        unseen_count,
    }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<OkResponse>, AppError> {
    let updated = notification_service(&state)
        .mark_seen(notification_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, notification_id = %notification_id, user_id = %auth.user_id, "failed to mark notification");
            AppError::internal("failed to mark notification")
        })?;

    if !updated {
        return Err(AppError::not_found("notification not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

pub async fn add_story(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_file("media")
        .ok_or_else(|| AppError::bad_request("media is required"))?;
    if file.kind().is_none() {
        return Err(AppError::bad_request("unsupported media type"));
    }

    let key = MediaService::new(state.storage.clone())
        .store(MediaFolder::Stories, auth.user_id, &file)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to store story media");
            AppError::internal("failed to store media")
        })?;

    let story = match StoryService::new(state.db.clone(), state.storage.clone())
        .create_story(auth.user_id, &key)
        .await
    {
        Ok(story) => story,
        Err(err) => {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create story");
            MediaService::new(state.storage.clone()).remove(&key).await;
            return Err(AppError::internal("failed to create story"));
        }
    };

    tracing::info!(story_id = %story.id, user_id = %auth.user_id, "story created");
    Ok(Redirect::to("/"))
}

#[derive(Deserialize)]
pub struct MarkViewedForm {
    pub story_id: Option<String>,
    pub id: Option<String>,
}

pub async fn mark_story_viewed(
    State(state): State<AppState>,
    auth: AuthUser,
    Form(form): Form<MarkViewedForm>,
) -> Result<Json<OkResponse>, AppError> {
    let raw = form
        .story_id
        .filter(|value| !value.trim().is_empty())
        .or(form.id);
    let story_id = parse_submitted_id(raw.as_deref(), "missing story_id", "invalid story")?;

    let stories = StoryService::new(state.db.clone(), state.storage.clone());
    let story = stories
        .get_story(story_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, story_id = %story_id, "failed to load story");
            AppError::internal("failed to mark story")
        })?
        .ok_or_else(|| AppError::not_found("invalid story"))?;

    stories.mark_viewed(story.id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, story_id = %story_id, user_id = %auth.user_id, "failed to mark story viewed");
        AppError::internal("failed to mark story")
    })?;

    Ok(Json(OkResponse { ok: true }))
}

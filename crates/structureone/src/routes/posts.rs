//! `/api/posts`: an in-memory post store behind the middleware pipeline.
//!
//! | Method | Middleware | Result |
//! |--------|------------|--------|
//! | `GET` | rate 100/60 | `?id` → one post, else a page of 20 |
//! | `POST` | rate 10/60, auth, json, sanitize, validate | 201 with the post |
//! | `PUT` | rate 20/60, auth, json, sanitize, validate | author only, else 403 |
//! | `DELETE` | rate 20/60, auth | author only, else 403 |
//! | `DELETE` by admin or moderator | rate 50/60, auth, role | any post, or 404 |
//!
//! The author is the token's `id` claim, or `uid` for tokens issued from a
//! scalar subject. Writes from a token carrying neither are refused.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use http::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};
use structureone_core::token::UID_CLAIM;
use structureone_core::{ApiError, ApiResponse, ApiResult, BoxFuture, Claims, ResponseFormatter};
use structureone_middleware::{MiddlewareConfig, SanitizeKind, DEFAULT_ROLE_CLAIM};
use structureone_server::{RouteContext, Routes};
use tokio::sync::RwLock;

/// Posts returned per listing page.
pub const POSTS_PER_PAGE: usize = 20;

const ALLOWED: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

const MODERATOR_ROLES: [&str; 2] = ["admin", "moderator"];

/// A stored post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    /// Identifier, assigned on creation.
    pub id: u64,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Identity claim of the author's token.
    pub user_id: Value,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last update.
    pub updated_at: Option<String>,
}

/// Why an edit or delete was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRefused {
    /// No post with that id.
    NotFound,
    /// The caller is not the author.
    NotOwner,
}

#[derive(Debug, Default)]
struct Posts {
    next_id: u64,
    by_id: BTreeMap<u64, Post>,
}

/// Shared, cloneable handle to the post store.
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    inner: Arc<RwLock<Posts>>,
}

impl PostStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new post.
    pub async fn create(&self, title: String, content: String, user_id: Value) -> Post {
        let mut posts = self.inner.write().await;
        posts.next_id += 1;
        let post = Post {
            id: posts.next_id,
            title,
            content,
            user_id,
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
        };
        posts.by_id.insert(post.id, post.clone());
        post
    }

    /// Looks a post up.
    pub async fn get(&self, id: u64) -> Option<Post> {
        self.inner.read().await.by_id.get(&id).cloned()
    }

    /// One page of posts, newest first, and the total count. Pages start at 1.
    pub async fn list(&self, page: usize) -> (Vec<Post>, usize) {
        let posts = self.inner.read().await;
        let skip = page.saturating_sub(1).saturating_mul(POSTS_PER_PAGE);
        let items = posts
            .by_id
            .values()
            .rev()
            .skip(skip)
            .take(POSTS_PER_PAGE)
            .cloned()
            .collect();
        (items, posts.by_id.len())
    }

    /// Replaces title and content if `user_id` wrote the post.
    pub async fn update(
        &self,
        id: u64,
        title: String,
        content: String,
        user_id: &Value,
    ) -> Result<Post, EditRefused> {
        let mut posts = self.inner.write().await;
        let post = posts.by_id.get_mut(&id).ok_or(EditRefused::NotFound)?;
        if &post.user_id != user_id {
            return Err(EditRefused::NotOwner);
        }
        post.title = title;
        post.content = content;
        post.updated_at = Some(Utc::now().to_rfc3339());
        Ok(post.clone())
    }

    /// Removes a post. Returns whether it existed.
    pub async fn delete(&self, id: u64) -> bool {
        self.inner.write().await.by_id.remove(&id).is_some()
    }

    /// Removes a post if `user_id` wrote it.
    pub async fn delete_owned(&self, id: u64, user_id: &Value) -> Result<Post, EditRefused> {
        let mut posts = self.inner.write().await;
        let post = posts.by_id.get(&id).ok_or(EditRefused::NotFound)?;
        if &post.user_id != user_id {
            return Err(EditRefused::NotOwner);
        }
        posts.by_id.remove(&id).ok_or(EditRefused::NotFound)
    }
}

pub(super) fn register(routes: &mut Routes) {
    routes.legacy("posts").entry(index);
}

fn index(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
    Box::pin(async move {
        ctx.require_method_in(&ALLOWED)?;
        let store = ctx
            .state::<PostStore>()
            .cloned()
            .ok_or_else(|| ApiError::internal("post store is not registered"))?;

        match ctx.method().clone() {
            Method::GET => read(ctx, &store).await,
            Method::POST => create(ctx, &store).await,
            Method::PUT => update(ctx, &store).await,
            _ => delete(ctx, &store).await,
        }
    })
}

async fn read(ctx: &mut RouteContext, store: &PostStore) -> ApiResult<ApiResponse> {
    ctx.middleware(&MiddlewareConfig::new().rate(100, 60)).await?;

    if let Some(raw) = ctx.query("id") {
        let post = match parse_id(raw) {
            Some(id) => store.get(id).await,
            None => None,
        };
        let post = post.ok_or_else(|| ApiError::status(404, "Post not found"))?;
        return post_response(200, "Post found", &post);
    }

    let page = ctx
        .query("page")
        .and_then(|p| p.parse::<usize>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let (posts, total) = store.list(page).await;
    Ok(ApiResponse::ok("Post list")
        .with_field("posts", to_value(&posts)?)
        .with_field(
            "pagination",
            json!({
                "page": page,
                "per_page": POSTS_PER_PAGE,
                "total": total,
                "pages": total.div_ceil(POSTS_PER_PAGE),
            }),
        ))
}

async fn create(ctx: &mut RouteContext, store: &PostStore) -> ApiResult<ApiResponse> {
    let config = MiddlewareConfig::new()
        .rate(10, 60)
        .auth()
        .json(["title", "content"])
        .sanitize("title", SanitizeKind::String)
        .sanitize("content", SanitizeKind::String)
        .validate(validate_post);
    let out = ctx.middleware(&config).await?;
    let user = author(out.user.as_ref())?;

    let post = store
        .create(text(&out.data, "title"), text(&out.data, "content"), user)
        .await;
    tracing::info!(request_id = %ctx.request_id(), post_id = post.id, "post created");
    post_response(201, "Post created successfully", &post)
}

async fn update(ctx: &mut RouteContext, store: &PostStore) -> ApiResult<ApiResponse> {
    let config = MiddlewareConfig::new()
        .rate(20, 60)
        .auth()
        .json(["id", "title", "content"])
        .sanitize("title", SanitizeKind::String)
        .sanitize("content", SanitizeKind::String)
        .validate(validate_update);
    let out = ctx.middleware(&config).await?;

    let id = out
        .data
        .get("id")
        .and_then(value_id)
        .ok_or_else(|| ApiError::bad_request("Invalid id"))?;
    let user = author(out.user.as_ref())?;
    match store
        .update(id, text(&out.data, "title"), text(&out.data, "content"), &user)
        .await
    {
        Ok(post) => post_response(200, "Post updated successfully", &post),
        Err(EditRefused::NotFound) => Err(ApiError::status(404, "Post not found")),
        Err(EditRefused::NotOwner) => Err(ApiError::forbidden("You can only edit your own posts")),
    }
}

async fn delete(ctx: &mut RouteContext, store: &PostStore) -> ApiResult<ApiResponse> {
    let moderator = ctx
        .bearer_token()
        .and_then(|token| ctx.tokens().validate(token).ok())
        .is_some_and(|claims| is_moderator(&claims));
    let config = if moderator {
        MiddlewareConfig::new().rate(50, 60).auth().role(MODERATOR_ROLES)
    } else {
        MiddlewareConfig::new().rate(20, 60).auth()
    };
    let out = ctx.middleware(&config).await?;

    let raw = ctx
        .query("id")
        .ok_or_else(|| ApiError::bad_request("Post id is required"))?;
    let Some(id) = parse_id(raw) else {
        return Err(ApiError::status(404, "Post not found"));
    };

    if moderator {
        if !store.delete(id).await {
            return Err(ApiError::status(404, "Post not found"));
        }
        tracing::info!(request_id = %ctx.request_id(), post_id = id, "post deleted by moderator");
        return Ok(ApiResponse::ok("Post deleted by moderator"));
    }

    let user = author(out.user.as_ref())?;
    match store.delete_owned(id, &user).await {
        Ok(_) => Ok(ApiResponse::ok("Post deleted successfully")),
        Err(EditRefused::NotFound) => Err(ApiError::status(404, "Post not found")),
        Err(EditRefused::NotOwner) => Err(ApiError::forbidden("You can only delete your own posts")),
    }
}

fn validate_post(data: &Map<String, Value>) -> Result<(), String> {
    let title = char_len(data, "title");
    if title < 3 {
        return Err("Title must be at least 3 characters".into());
    }
    if title > 200 {
        return Err("Title cannot exceed 200 characters".into());
    }
    if char_len(data, "content") < 10 {
        return Err("Content must be at least 10 characters".into());
    }
    Ok(())
}

fn validate_update(data: &Map<String, Value>) -> Result<(), String> {
    if data.get("id").and_then(value_id).is_none() {
        return Err("Invalid id".into());
    }
    validate_post(data)
}

fn char_len(data: &Map<String, Value>, field: &str) -> usize {
    data.get(field)
        .and_then(Value::as_str)
        .map_or(0, |s| s.chars().count())
}

fn text(data: &Map<String, Value>, field: &str) -> String {
    match data.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn author(user: Option<&Claims>) -> ApiResult<Value> {
    user.and_then(|claims| claims.get("id").or_else(|| claims.get(UID_CLAIM)))
        .filter(|value| !value.is_null())
        .cloned()
        .ok_or_else(|| ApiError::forbidden("Token does not identify a user"))
}

fn is_moderator(claims: &Claims) -> bool {
    match claims.get(DEFAULT_ROLE_CLAIM) {
        Some(Value::String(role)) => MODERATOR_ROLES.contains(&role.as_str()),
        Some(Value::Array(roles)) => roles
            .iter()
            .filter_map(Value::as_str)
            .any(|role| MODERATOR_ROLES.contains(&role)),
        _ => false,
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

fn value_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_id(s),
        _ => None,
    }
}

fn to_value<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(format!("post serialization failed: {e}")))
}

fn post_response(status: u16, message: &str, post: &Post) -> ApiResult<ApiResponse> {
    ResponseFormatter::format(status, Some(message.to_string()), Some(json!({ "post": to_value(post)? })))
}

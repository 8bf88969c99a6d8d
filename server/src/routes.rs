use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use threadboard_auth::session::get_user_from_headers;
use threadboard_auth::user::User;
use threadboard_core::comment::{self, Comment, CommentDeletion, CommentWithChildren};
use threadboard_core::post::{self, Post, PostInput, PostWithInfo};
use threadboard_core::ranking::{self, CommentReaction, CommentSortType, PostReaction, PostSortType};
use threadboard_core::state::ForumState;
use threadboard_utils::errors::AppError;

/// [`AppError`] sent back as its status code with the serialized error as JSON body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse(pub AppError);

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        }
        (status, Json(self.0)).into_response()
    }
}

type ApiResult<T> = Result<T, ErrorResponse>;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostListParams {
    pub sort_type: PostSortType,
    pub limit: Option<i64>,
    pub offset: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentTreeParams {
    pub sort_type: CommentSortType,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PostEdit {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommentInput {
    pub parent_comment_id: Option<i64>,
    pub body: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommentEdit {
    pub body: String,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ReactionRequest {
    pub is_like: bool,
}

pub fn create_router(state: ForumState) -> Router {
    Router::new()
        .route("/api/posts", get(get_post_vec).post(create_post))
        .route("/api/posts/{post_id}", get(get_post).patch(update_post).delete(delete_post))
        .route("/api/posts/{post_id}/reactions", post(react_to_post))
        .route("/api/posts/{post_id}/comments", get(get_comment_tree).post(create_comment))
        .route("/api/comments/{comment_id}", patch(update_comment).delete(delete_comment))
        .route("/api/comments/{comment_id}/reactions", post(react_to_comment))
        .with_state(state)
}

fn get_user(headers: &HeaderMap) -> ApiResult<Option<User>> {
    Ok(get_user_from_headers(headers)?)
}

async fn get_post_vec(
    State(state): State<ForumState>,
    Query(params): Query<PostListParams>,
) -> ApiResult<Json<Vec<Post>>> {
    let limit = params.limit.unwrap_or(post::POST_BATCH_SIZE);
    Ok(Json(post::get_post_vec(params.sort_type, limit, params.offset, &state).await?))
}

async fn create_post(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Json(post_input): Json<PostInput>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let user = get_user(&headers)?;
    let post = post::create_post(post_input, user.as_ref(), &state).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<PostWithInfo>> {
    let user = get_user(&headers)?;
    Ok(Json(post::get_post_with_info(post_id, user.as_ref(), &state).await?))
}

async fn update_post(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(post_edit): Json<PostEdit>,
) -> ApiResult<Json<Post>> {
    let user = get_user(&headers)?;
    let post = post::update_post(post_id, post_edit.title, post_edit.body, user.as_ref(), &state).await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user = get_user(&headers)?;
    post::delete_post(post_id, user.as_ref(), &state).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn react_to_post(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(reaction_request): Json<ReactionRequest>,
) -> ApiResult<Json<PostReaction>> {
    let user = get_user(&headers)?;
    Ok(Json(ranking::react_to_post(post_id, reaction_request.is_like, user.as_ref(), &state).await?))
}

async fn get_comment_tree(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Query(params): Query<CommentTreeParams>,
) -> ApiResult<Json<Vec<CommentWithChildren>>> {
    let user = get_user(&headers)?;
    Ok(Json(comment::get_post_comment_tree(post_id, params.sort_type, user.as_ref(), &state).await?))
}

async fn create_comment(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(comment_input): Json<CommentInput>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let user = get_user(&headers)?;
    let comment = comment::create_comment(
        post_id,
        comment_input.parent_comment_id,
        &comment_input.body,
        user.as_ref(),
        &state,
    ).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(comment_edit): Json<CommentEdit>,
) -> ApiResult<Json<Comment>> {
    let user = get_user(&headers)?;
    Ok(Json(comment::update_comment(comment_id, &comment_edit.body, user.as_ref(), &state).await?))
}

async fn delete_comment(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
) -> ApiResult<Json<CommentDeletion>> {
    let user = get_user(&headers)?;
    Ok(Json(comment::delete_comment(comment_id, user.as_ref(), &state).await?))
}

async fn react_to_comment(
    State(state): State<ForumState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(reaction_request): Json<ReactionRequest>,
) -> ApiResult<Json<CommentReaction>> {
    let user = get_user(&headers)?;
    Ok(Json(ranking::react_to_comment(comment_id, reaction_request.is_like, user.as_ref(), &state).await?))
}

use serde::{Deserialize, Serialize};
use validator::Validate;

use threadboard_auth::session::check_user;
use threadboard_auth::user::User;
use threadboard_utils::checks::{check_post_title, check_string_length};
use threadboard_utils::constants::MAX_CONTENT_LENGTH;
use threadboard_utils::errors::AppError;

use crate::media::Media;
use crate::notification::Notification;
use crate::ranking::{PostSortType, Reaction, ReactionTarget};
use crate::state::ForumState;

pub const POST_BATCH_SIZE: i64 = 50;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: i64,
    pub title: String,
    pub body: String,
    pub creator_id: i64,
    pub creator_name: String,
    pub points: i32,
    pub media: Option<Media>,
    pub create_timestamp: chrono::DateTime<chrono::Utc>,
    pub edit_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Validate, Serialize, Deserialize)]
pub struct PostInput {
    #[validate(custom(function = "check_post_title"))]
    pub title: String,
    #[validate(length(max = MAX_CONTENT_LENGTH, message = "Post body is too long."))]
    pub body: String,
    #[validate(nested)]
    pub media: Option<Media>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWithInfo {
    pub post: Post,
    pub reaction: Option<Reaction>,
}

/// Validated edition of a post, at least one of title or body is modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostUpdate {
    Title(String),
    Body(String),
    TitleAndBody {
        title: String,
        body: String,
    },
}

impl PostUpdate {
    /// Builds a post edition from optional fields, empty strings are considered absent.
    pub fn new(title: Option<String>, body: Option<String>) -> Result<Self, AppError> {
        let title = title.filter(|title| !title.is_empty());
        let body = body.filter(|body| !body.is_empty());
        let post_update = match (title, body) {
            (Some(title), Some(body)) => PostUpdate::TitleAndBody { title, body },
            (Some(title), None) => PostUpdate::Title(title),
            (None, Some(body)) => PostUpdate::Body(body),
            (None, None) => return Err(AppError::validation("Either a title or body must be present.")),
        };
        if let Some(title) = post_update.title() {
            check_post_title(title)?;
        }
        if let Some(body) = post_update.body() {
            check_string_length(body, "Post body", MAX_CONTENT_LENGTH as usize, true)?;
        }
        Ok(post_update)
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            PostUpdate::Title(title) | PostUpdate::TitleAndBody { title, .. } => Some(title),
            PostUpdate::Body(_) => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            PostUpdate::Body(body) | PostUpdate::TitleAndBody { body, .. } => Some(body),
            PostUpdate::Title(_) => None,
        }
    }

    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = self.title() {
            post.title = String::from(title);
        }
        if let Some(body) = self.body() {
            post.body = String::from(body);
        }
    }
}

#[cfg(feature = "ssr")]
pub mod ssr {
    use sqlx::PgPool;

    use threadboard_auth::user::User;
    use threadboard_utils::errors::AppError;

    use crate::media::Media;
    use crate::post::{Post, PostInput, PostUpdate};
    use crate::ranking::PostSortType;

    /// Row of the posts table, the media is stored in nullable columns.
    #[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
    pub struct SqlPost {
        pub post_id: i64,
        pub title: String,
        pub body: String,
        pub creator_id: i64,
        pub creator_name: String,
        pub points: i32,
        pub media_external_id: Option<String>,
        pub media_content_type: Option<String>,
        pub create_timestamp: chrono::DateTime<chrono::Utc>,
        pub edit_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    }

    impl SqlPost {
        pub fn into_post(self) -> Post {
            let media = match (self.media_external_id, self.media_content_type) {
                (Some(external_id), Some(content_type)) => Some(Media {
                    external_id,
                    content_type,
                }),
                _ => None,
            };
            Post {
                post_id: self.post_id,
                title: self.title,
                body: self.body,
                creator_id: self.creator_id,
                creator_name: self.creator_name,
                points: self.points,
                media,
                create_timestamp: self.create_timestamp,
                edit_timestamp: self.edit_timestamp,
            }
        }
    }

    pub async fn get_post_by_id(
        post_id: i64,
        db_pool: &PgPool,
    ) -> Result<Post, AppError> {
        let post = sqlx::query_as::<_, SqlPost>(
            "SELECT * FROM posts WHERE post_id = $1"
        )
            .bind(post_id)
            .fetch_one(db_pool)
            .await?;

        Ok(post.into_post())
    }

    pub async fn get_post_vec(
        sort_type: PostSortType,
        limit: i64,
        offset: i64,
        db_pool: &PgPool,
    ) -> Result<Vec<Post>, AppError> {
        let post_vec = sqlx::query_as::<_, SqlPost>(
            format!(
                "SELECT * FROM posts
                ORDER BY {} DESC, post_id DESC
                LIMIT $1
                OFFSET $2",
                sort_type.to_order_by_code(),
            ).as_str()
        )
            .bind(limit)
            .bind(offset)
            .fetch_all(db_pool)
            .await?;

        Ok(post_vec.into_iter().map(SqlPost::into_post).collect())
    }

    pub async fn create_post(
        post_input: &PostInput,
        user: &User,
        db_pool: &PgPool,
    ) -> Result<Post, AppError> {
        let post = sqlx::query_as::<_, SqlPost>(
            "INSERT INTO posts (title, body, creator_id, creator_name, media_external_id, media_content_type)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
            .bind(&post_input.title)
            .bind(&post_input.body)
            .bind(user.user_id)
            .bind(&user.username)
            .bind(post_input.media.as_ref().map(|media| media.external_id.as_str()))
            .bind(post_input.media.as_ref().map(|media| media.content_type.as_str()))
            .fetch_one(db_pool)
            .await?;

        Ok(post.into_post())
    }

    pub async fn update_post(
        post_id: i64,
        post_update: &PostUpdate,
        db_pool: &PgPool,
    ) -> Result<Post, AppError> {
        let post = sqlx::query_as::<_, SqlPost>(
            "UPDATE posts SET
                title = COALESCE($1, title),
                body = COALESCE($2, body),
                edit_timestamp = NOW()
            WHERE post_id = $3
            RETURNING *",
        )
            .bind(post_update.title())
            .bind(post_update.body())
            .bind(post_id)
            .fetch_one(db_pool)
            .await?;

        Ok(post.into_post())
    }

    /// Deletes the post, its comments and all reactions on them through cascading foreign keys.
    pub async fn delete_post(
        post_id: i64,
        db_pool: &PgPool,
    ) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id)
            .execute(db_pool)
            .await?;

        match result.rows_affected() {
            0 => Err(AppError::NotFound),
            _ => Ok(()),
        }
    }
}

pub async fn create_post(
    post_input: PostInput,
    user: Option<&User>,
    state: &ForumState,
) -> Result<Post, AppError> {
    log::trace!("Create post '{}'", post_input.title);
    post_input.validate()?;
    let user = check_user(user)?;
    let post = state.store.create_post(&post_input, user).await?;
    log::debug!("Created post {} for user {}", post.post_id, user.user_id);
    Ok(post)
}

pub async fn get_post_by_id(
    post_id: i64,
    state: &ForumState,
) -> Result<Post, AppError> {
    state.store.get_post_by_id(post_id).await
}

/// Get the post `post_id` together with the reaction of `user`.
pub async fn get_post_with_info(
    post_id: i64,
    user: Option<&User>,
    state: &ForumState,
) -> Result<PostWithInfo, AppError> {
    let post = state.store.get_post_by_id(post_id).await?;
    let reaction = match user {
        Some(user) => state.store.get_user_reaction(user.user_id, ReactionTarget::Post(post_id)).await?,
        None => None,
    };
    Ok(PostWithInfo { post, reaction })
}

pub async fn get_post_vec(
    sort_type: PostSortType,
    limit: i64,
    offset: i64,
    state: &ForumState,
) -> Result<Vec<Post>, AppError> {
    if offset < 0 {
        return Err(AppError::validation("Offset cannot be negative."));
    }
    let limit = limit.clamp(1, POST_BATCH_SIZE);
    state.store.get_post_vec(sort_type, limit, offset).await
}

/// Edit the title and/or body of the post `post_id`, only allowed for the creator of the post.
pub async fn update_post(
    post_id: i64,
    title: Option<String>,
    body: Option<String>,
    user: Option<&User>,
    state: &ForumState,
) -> Result<Post, AppError> {
    log::trace!("Update post {post_id}");
    let post_update = PostUpdate::new(title, body)?;
    let user = check_user(user)?;
    let post = state.store.get_post_by_id(post_id).await?;
    user.check_is_owner(post.creator_id)?;
    state.store.update_post(post_id, &post_update).await
}

/// Delete the post `post_id` with its comments and reactions, only allowed for the creator of the post.
pub async fn delete_post(
    post_id: i64,
    user: Option<&User>,
    state: &ForumState,
) -> Result<(), AppError> {
    log::trace!("Delete post {post_id}");
    let user = check_user(user)?;
    let post = state.store.get_post_by_id(post_id).await?;
    user.check_is_owner(post.creator_id)?;
    state.store.delete_post(post_id).await?;
    state.notification_bus.publish(Notification::PostDeleted {
        post_id,
        trigger_user_id: user.user_id,
    });
    Ok(())
}

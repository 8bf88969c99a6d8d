use async_trait::async_trait;

use threadboard_auth::user::User;
use threadboard_utils::errors::AppError;

use crate::comment::{Comment, CommentDeletion, CommentWithChildren};
use crate::post::{Post, PostInput, PostUpdate};
use crate::ranking::{CommentSortType, PostSortType, Reaction, ReactionTarget};

/// Persistence of posts, comments and reactions.
///
/// Getters of a single entity fail with `AppError::NotFound` when it does not exist. Reactions are applied
/// atomically with the points delta of their target, and concurrent reactions on the same target are serialized.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_post(&self, post_input: &PostInput, user: &User) -> Result<Post, AppError>;

    async fn get_post_by_id(&self, post_id: i64) -> Result<Post, AppError>;

    async fn get_post_vec(&self, sort_type: PostSortType, limit: i64, offset: i64) -> Result<Vec<Post>, AppError>;

    async fn update_post(&self, post_id: i64, post_update: &PostUpdate) -> Result<Post, AppError>;

    /// Deletes the post together with its comments and all reactions on them.
    async fn delete_post(&self, post_id: i64) -> Result<(), AppError>;

    async fn create_comment(
        &self,
        post_id: i64,
        parent_comment_id: Option<i64>,
        body: &str,
        user: &User,
    ) -> Result<Comment, AppError>;

    async fn get_comment_by_id(&self, comment_id: i64) -> Result<Comment, AppError>;

    /// Flat list of the comments of a post with the reaction of `user_id`, sorted by `sort_type`.
    async fn get_post_comment_vec(
        &self,
        post_id: i64,
        sort_type: CommentSortType,
        user_id: Option<i64>,
    ) -> Result<Vec<CommentWithChildren>, AppError>;

    /// Updates the body of a comment that is not deleted.
    async fn update_comment(&self, comment_id: i64, body: &str) -> Result<Comment, AppError>;

    async fn count_child_comments(&self, comment_id: i64) -> Result<i64, AppError>;

    /// Removes a comment without children or marks it as deleted, the choice is made atomically with the deletion.
    async fn delete_comment(&self, comment_id: i64) -> Result<CommentDeletion, AppError>;

    async fn get_user_reaction(&self, user_id: i64, target: ReactionTarget) -> Result<Option<Reaction>, AppError>;

    async fn apply_post_reaction(
        &self,
        user_id: i64,
        post_id: i64,
        is_like: bool,
    ) -> Result<(Option<Reaction>, Post), AppError>;

    /// Same as [`ContentStore::apply_post_reaction`], deleted comments cannot be reacted to.
    async fn apply_comment_reaction(
        &self,
        user_id: i64,
        comment_id: i64,
        is_like: bool,
    ) -> Result<(Option<Reaction>, Comment), AppError>;
}

#[cfg(feature = "ssr")]
pub mod ssr {
    use async_trait::async_trait;
    use sqlx::PgPool;

    use threadboard_auth::user::User;
    use threadboard_utils::errors::AppError;

    use crate::comment::{self, Comment, CommentDeletion, CommentWithChildren};
    use crate::post::ssr::SqlPost;
    use crate::post::{self, Post, PostInput, PostUpdate};
    use crate::ranking::{self, CommentSortType, PostSortType, Reaction, ReactionTarget};
    use crate::store::ContentStore;

    /// Postgres implementation of [`ContentStore`].
    #[derive(Clone, Debug)]
    pub struct PgStore {
        db_pool: PgPool,
    }

    impl PgStore {
        pub fn new(db_pool: PgPool) -> Self {
            Self { db_pool }
        }
    }

    #[async_trait]
    impl ContentStore for PgStore {
        async fn create_post(&self, post_input: &PostInput, user: &User) -> Result<Post, AppError> {
            post::ssr::create_post(post_input, user, &self.db_pool).await
        }

        async fn get_post_by_id(&self, post_id: i64) -> Result<Post, AppError> {
            post::ssr::get_post_by_id(post_id, &self.db_pool).await
        }

        async fn get_post_vec(&self, sort_type: PostSortType, limit: i64, offset: i64) -> Result<Vec<Post>, AppError> {
            post::ssr::get_post_vec(sort_type, limit, offset, &self.db_pool).await
        }

        async fn update_post(&self, post_id: i64, post_update: &PostUpdate) -> Result<Post, AppError> {
            post::ssr::update_post(post_id, post_update, &self.db_pool).await
        }

        async fn delete_post(&self, post_id: i64) -> Result<(), AppError> {
            post::ssr::delete_post(post_id, &self.db_pool).await
        }

        async fn create_comment(
            &self,
            post_id: i64,
            parent_comment_id: Option<i64>,
            body: &str,
            user: &User,
        ) -> Result<Comment, AppError> {
            comment::ssr::create_comment(post_id, parent_comment_id, body, user, &self.db_pool).await
        }

        async fn get_comment_by_id(&self, comment_id: i64) -> Result<Comment, AppError> {
            comment::ssr::get_comment_by_id(comment_id, &self.db_pool).await
        }

        async fn get_post_comment_vec(
            &self,
            post_id: i64,
            sort_type: CommentSortType,
            user_id: Option<i64>,
        ) -> Result<Vec<CommentWithChildren>, AppError> {
            comment::ssr::get_post_comment_vec(post_id, sort_type, user_id, &self.db_pool).await
        }

        async fn update_comment(&self, comment_id: i64, body: &str) -> Result<Comment, AppError> {
            comment::ssr::update_comment(comment_id, body, &self.db_pool).await
        }

        async fn count_child_comments(&self, comment_id: i64) -> Result<i64, AppError> {
            comment::ssr::count_child_comments(comment_id, &self.db_pool).await
        }

        async fn delete_comment(&self, comment_id: i64) -> Result<CommentDeletion, AppError> {
            comment::ssr::delete_comment(comment_id, &self.db_pool).await
        }

        async fn get_user_reaction(&self, user_id: i64, target: ReactionTarget) -> Result<Option<Reaction>, AppError> {
            ranking::ssr::get_user_reaction(user_id, target, &self.db_pool).await
        }

        async fn apply_post_reaction(
            &self,
            user_id: i64,
            post_id: i64,
            is_like: bool,
        ) -> Result<(Option<Reaction>, Post), AppError> {
            let (reaction, post) = ranking::ssr::apply_reaction::<SqlPost>(
                user_id,
                ReactionTarget::Post(post_id),
                is_like,
                &self.db_pool,
            ).await?;
            Ok((reaction, post.into_post()))
        }

        async fn apply_comment_reaction(
            &self,
            user_id: i64,
            comment_id: i64,
            is_like: bool,
        ) -> Result<(Option<Reaction>, Comment), AppError> {
            ranking::ssr::apply_reaction::<Comment>(
                user_id,
                ReactionTarget::Comment(comment_id),
                is_like,
                &self.db_pool,
            ).await
        }
    }
}

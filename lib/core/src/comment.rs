use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use threadboard_auth::session::check_user;
use threadboard_auth::user::User;
use threadboard_utils::checks::check_comment_body;
use threadboard_utils::constants::DELETED_MESSAGE;
use threadboard_utils::errors::AppError;

use crate::notification::Notification;
use crate::ranking::{CommentSortType, Reaction};
use crate::state::ForumState;

#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: i64,
    pub body: String,
    pub creator_id: i64,
    pub creator_name: String,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub points: i32,
    pub is_deleted: bool,
    pub create_timestamp: chrono::DateTime<chrono::Utc>,
    pub edit_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentWithChildren {
    pub comment: Comment,
    pub reaction: Option<Reaction>,
    pub child_comments: Vec<CommentWithChildren>,
}

/// Outcome of a comment deletion: comments with replies are kept as tombstones to preserve the thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentDeletion {
    Removed,
    Tombstoned(Comment),
}

impl Comment {
    /// Hides the body and creator of a deleted comment.
    pub fn redact(&mut self) {
        self.body = String::from(DELETED_MESSAGE);
        self.creator_name = String::from(DELETED_MESSAGE);
    }
}

impl CommentWithChildren {
    pub fn new(comment: Comment, reaction: Option<Reaction>) -> Self {
        CommentWithChildren {
            comment,
            reaction,
            child_comments: Vec::new(),
        }
    }

    fn redact_if_deleted(mut self) -> Self {
        if self.comment.is_deleted {
            self.comment.redact();
            self.reaction = None;
        }
        self
    }
}

/// Builds the forest of comments whose parent is `parent_id`, children are attached recursively.
///
/// Comments keep the order of `comment_vec` among their siblings. Comments whose parent is not reachable from
/// `parent_id` are not part of the result.
pub fn build_comment_tree(
    comment_vec: Vec<CommentWithChildren>,
    parent_id: Option<i64>,
) -> Vec<CommentWithChildren> {
    let mut child_comment_map = HashMap::<Option<i64>, Vec<CommentWithChildren>>::new();
    for comment in comment_vec {
        child_comment_map.entry(comment.comment.parent_id).or_default().push(comment);
    }
    attach_child_comments(parent_id, &mut child_comment_map)
}

// Each entry of the map is taken at most once, so cyclic parent ids cannot loop.
fn attach_child_comments(
    parent_id: Option<i64>,
    child_comment_map: &mut HashMap<Option<i64>, Vec<CommentWithChildren>>,
) -> Vec<CommentWithChildren> {
    let mut child_comments = child_comment_map.remove(&parent_id).unwrap_or_default();
    for child_comment in &mut child_comments {
        child_comment.child_comments = attach_child_comments(Some(child_comment.comment.comment_id), child_comment_map);
    }
    child_comments
}

#[cfg(feature = "ssr")]
pub mod ssr {
    use sqlx::{Executor, PgPool, Postgres};

    use threadboard_auth::user::User;
    use threadboard_utils::errors::AppError;

    use crate::comment::{Comment, CommentDeletion, CommentWithChildren};
    use crate::ranking::{CommentSortType, Reaction, ReactionTarget};

    /// Comment joined with the reaction of the requesting user.
    #[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
    pub struct CommentWithReaction {
        #[sqlx(flatten)]
        pub comment: Comment,
        pub reaction_id: Option<i64>,
        pub reaction_user_id: Option<i64>,
        pub is_like: Option<bool>,
        pub reaction_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    }

    impl CommentWithReaction {
        pub fn into_comment_with_children(self) -> CommentWithChildren {
            let reaction = match (self.reaction_id, self.reaction_user_id, self.is_like, self.reaction_timestamp) {
                (Some(reaction_id), Some(user_id), Some(is_like), Some(create_timestamp)) => Some(Reaction {
                    reaction_id,
                    user_id,
                    target: ReactionTarget::Comment(self.comment.comment_id),
                    is_like,
                    create_timestamp,
                }),
                _ => None,
            };
            CommentWithChildren::new(self.comment, reaction)
        }
    }

    pub async fn get_comment_by_id(
        comment_id: i64,
        db_pool: &PgPool,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments
            WHERE comment_id = $1",
        )
            .bind(comment_id)
            .fetch_one(db_pool)
            .await?;

        Ok(comment)
    }

    /// Flat list of the comments of `post_id` sorted by `sort_type`, with the reaction of `user_id`.
    pub async fn get_post_comment_vec(
        post_id: i64,
        sort_type: CommentSortType,
        user_id: Option<i64>,
        db_pool: &PgPool,
    ) -> Result<Vec<CommentWithChildren>, AppError> {
        let comment_with_reaction_vec = sqlx::query_as::<_, CommentWithReaction>(
            format!(
                "SELECT
                    c.*,
                    r.reaction_id,
                    r.user_id AS reaction_user_id,
                    r.is_like,
                    r.create_timestamp AS reaction_timestamp
                FROM comments c
                LEFT JOIN comment_reactions r
                ON r.comment_id = c.comment_id AND
                   r.user_id = $1
                WHERE c.post_id = $2
                ORDER BY c.{} DESC, c.comment_id DESC",
                sort_type.to_order_by_code(),
            ).as_str(),
        )
            .bind(user_id)
            .bind(post_id)
            .fetch_all(db_pool)
            .await?;

        Ok(comment_with_reaction_vec.into_iter().map(CommentWithReaction::into_comment_with_children).collect())
    }

    pub async fn create_comment(
        post_id: i64,
        parent_comment_id: Option<i64>,
        body: &str,
        user: &User,
        db_pool: &PgPool,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (body, parent_id, post_id, creator_id, creator_name)
            VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
            .bind(body)
            .bind(parent_comment_id)
            .bind(post_id)
            .bind(user.user_id)
            .bind(&user.username)
            .fetch_one(db_pool)
            .await?;

        Ok(comment)
    }

    pub async fn update_comment(
        comment_id: i64,
        body: &str,
        db_pool: &PgPool,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET
                body = $1,
                edit_timestamp = NOW()
            WHERE
                comment_id = $2 AND
                NOT is_deleted
            RETURNING *",
        )
            .bind(body)
            .bind(comment_id)
            .fetch_one(db_pool)
            .await?;

        Ok(comment)
    }

    /// Counts the direct children of `comment_id`, with a pool or inside a transaction.
    pub async fn count_child_comments<'e, E>(
        comment_id: i64,
        executor: E,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let child_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE parent_id = $1"
        )
            .bind(comment_id)
            .fetch_one(executor)
            .await?;

        Ok(child_count)
    }

    /// Removes the comment if it has no child, otherwise marks it as deleted.
    ///
    /// The comment row is locked while counting its children, a reply created concurrently waits for the end of
    /// the transaction and fails if the comment was removed.
    pub async fn delete_comment(
        comment_id: i64,
        db_pool: &PgPool,
    ) -> Result<CommentDeletion, AppError> {
        let mut transaction = db_pool.begin().await?;

        let comment = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE comment_id = $1 FOR UPDATE"
        )
            .bind(comment_id)
            .fetch_one(&mut *transaction)
            .await?;

        if comment.is_deleted {
            transaction.commit().await?;
            return Ok(CommentDeletion::Tombstoned(comment));
        }

        let child_count = count_child_comments(comment_id, &mut *transaction).await?;

        let comment_deletion = if child_count == 0 {
            sqlx::query("DELETE FROM comments WHERE comment_id = $1")
                .bind(comment_id)
                .execute(&mut *transaction)
                .await?;
            CommentDeletion::Removed
        } else {
            let comment = sqlx::query_as::<_, Comment>(
                "UPDATE comments SET
                    is_deleted = TRUE,
                    edit_timestamp = NOW()
                WHERE comment_id = $1
                RETURNING *",
            )
                .bind(comment_id)
                .fetch_one(&mut *transaction)
                .await?;
            CommentDeletion::Tombstoned(comment)
        };

        transaction.commit().await?;

        Ok(comment_deletion)
    }

    #[cfg(test)]
    mod tests {
        use crate::comment::ssr::CommentWithReaction;
        use crate::comment::Comment;
        use crate::ranking::ReactionTarget;

        #[test]
        fn test_comment_with_reaction_into_comment_with_children() {
            let comment = Comment {
                comment_id: 3,
                creator_id: 1,
                ..Default::default()
            };

            let comment_without_reaction = CommentWithReaction {
                comment: comment.clone(),
                reaction_id: None,
                reaction_user_id: None,
                is_like: None,
                reaction_timestamp: None,
            }.into_comment_with_children();
            assert_eq!(comment_without_reaction.comment, comment);
            assert_eq!(comment_without_reaction.reaction, None);
            assert!(comment_without_reaction.child_comments.is_empty());

            let comment_with_reaction = CommentWithReaction {
                comment: comment.clone(),
                reaction_id: Some(7),
                reaction_user_id: Some(2),
                is_like: Some(false),
                reaction_timestamp: Some(comment.create_timestamp),
            }.into_comment_with_children();
            let reaction = comment_with_reaction.reaction.expect("CommentWithChildren should contain reaction.");
            assert_eq!(comment_with_reaction.comment, comment);
            assert_eq!(reaction.reaction_id, 7);
            assert_eq!(reaction.user_id, 2);
            assert_eq!(reaction.target, ReactionTarget::Comment(comment.comment_id));
            assert!(!reaction.is_like);
        }
    }
}

/// Get the comment tree of `post_id`, with the reactions of `user`. Deleted comments are redacted.
pub async fn get_post_comment_tree(
    post_id: i64,
    sort_type: CommentSortType,
    user: Option<&User>,
    state: &ForumState,
) -> Result<Vec<CommentWithChildren>, AppError> {
    log::trace!("Get comment tree of post {post_id} sorted by {sort_type}");
    state.store.get_post_by_id(post_id).await?;
    let comment_vec = state.store
        .get_post_comment_vec(post_id, sort_type, user.map(|user| user.user_id))
        .await?
        .into_iter()
        .map(CommentWithChildren::redact_if_deleted)
        .collect();
    Ok(build_comment_tree(comment_vec, None))
}

pub async fn get_comment_by_id(
    comment_id: i64,
    state: &ForumState,
) -> Result<Comment, AppError> {
    state.store.get_comment_by_id(comment_id).await
}

/// Create a comment on `post_id`, as a reply to `parent_comment_id` if it is defined.
pub async fn create_comment(
    post_id: i64,
    parent_comment_id: Option<i64>,
    body: &str,
    user: Option<&User>,
    state: &ForumState,
) -> Result<Comment, AppError> {
    log::trace!("Create comment on post {post_id}, parent = {parent_comment_id:?}");
    check_comment_body(body)?;
    let user = check_user(user)?;
    state.store.get_post_by_id(post_id).await?;
    if let Some(parent_comment_id) = parent_comment_id {
        let parent_comment = state.store.get_comment_by_id(parent_comment_id).await?;
        if parent_comment.post_id != post_id {
            return Err(AppError::validation("Parent comment belongs to another post."));
        }
        if parent_comment.is_deleted {
            return Err(AppError::validation("Cannot reply to a deleted comment."));
        }
    }

    let comment = state.store.create_comment(post_id, parent_comment_id, body, user).await?;
    log::debug!("Created comment {} on post {post_id}", comment.comment_id);
    state.notification_bus.publish(Notification::CommentCreated {
        post_id,
        comment_id: comment.comment_id,
        parent_id: parent_comment_id,
        trigger_user_id: user.user_id,
    });
    Ok(comment)
}

/// Edit the body of `comment_id`, only allowed for its creator.
pub async fn update_comment(
    comment_id: i64,
    body: &str,
    user: Option<&User>,
    state: &ForumState,
) -> Result<Comment, AppError> {
    log::trace!("Update comment {comment_id}");
    check_comment_body(body)?;
    let user = check_user(user)?;
    let comment = state.store.get_comment_by_id(comment_id).await?;
    if comment.is_deleted {
        return Err(AppError::NotFound);
    }
    user.check_is_owner(comment.creator_id)?;
    state.store.update_comment(comment_id, body).await
}

/// Delete `comment_id`, only allowed for its creator. A comment with replies is kept as a tombstone.
pub async fn delete_comment(
    comment_id: i64,
    user: Option<&User>,
    state: &ForumState,
) -> Result<CommentDeletion, AppError> {
    log::trace!("Delete comment {comment_id}");
    let user = check_user(user)?;
    let comment = state.store.get_comment_by_id(comment_id).await?;
    user.check_is_owner(comment.creator_id)?;
    let comment_deletion = state.store.delete_comment(comment_id).await?;
    log::debug!("Deleted comment {comment_id}: {comment_deletion:?}");
    if !comment.is_deleted {
        state.notification_bus.publish(Notification::CommentDeleted {
            post_id: comment.post_id,
            comment_id,
            trigger_user_id: user.user_id,
            is_tombstone: matches!(comment_deletion, CommentDeletion::Tombstoned(_)),
        });
    }
    Ok(comment_deletion)
}

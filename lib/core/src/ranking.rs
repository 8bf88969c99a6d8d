use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use threadboard_auth::session::check_user;
use threadboard_auth::user::User;
use threadboard_utils::constants::{BEST_ORDER_BY_COLUMN, MILLION, RECENT_ORDER_BY_COLUMN, THOUSAND};
use threadboard_utils::errors::AppError;

use crate::comment::Comment;
use crate::notification::Notification;
use crate::post::Post;
use crate::state::ForumState;

#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PostSortType {
    #[default]
    Best,
    Recent,
}

#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CommentSortType {
    #[default]
    Best,
    Recent,
}

/// State of the reaction of a user on a post or comment. The value of each state is its contribution to the
/// points of the target.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[repr(i16)]
pub enum ReactionState {
    Liked = 1,
    #[default]
    NoReaction = 0,
    Disliked = -1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReactionAction {
    Create,
    Flip,
    Retract,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReactionTransition {
    pub previous: ReactionState,
    pub next: ReactionState,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ReactionTarget {
    Post(i64),
    Comment(i64),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub reaction_id: i64,
    pub user_id: i64,
    pub target: ReactionTarget,
    pub is_like: bool,
    pub create_timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReaction {
    pub reaction: Option<Reaction>,
    pub post: Post,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentReaction {
    pub reaction: Option<Reaction>,
    pub comment: Comment,
}

impl PostSortType {
    pub fn to_order_by_code(self) -> &'static str {
        match self {
            PostSortType::Best => BEST_ORDER_BY_COLUMN,
            PostSortType::Recent => RECENT_ORDER_BY_COLUMN,
        }
    }
}

impl CommentSortType {
    pub fn to_order_by_code(self) -> &'static str {
        match self {
            CommentSortType::Best => BEST_ORDER_BY_COLUMN,
            CommentSortType::Recent => RECENT_ORDER_BY_COLUMN,
        }
    }
}

impl ReactionState {
    pub fn from_is_like(is_like: bool) -> Self {
        match is_like {
            true => ReactionState::Liked,
            false => ReactionState::Disliked,
        }
    }

    pub fn from_reaction(reaction: Option<&Reaction>) -> Self {
        reaction.map(Reaction::state).unwrap_or_default()
    }

    /// Returns the transition caused by a like (`is_like = true`) or a dislike request.
    ///
    /// Requesting the current state retracts the reaction, requesting the opposite state flips it.
    pub fn apply(self, is_like: bool) -> ReactionTransition {
        let requested = ReactionState::from_is_like(is_like);
        let next = match self == requested {
            true => ReactionState::NoReaction,
            false => requested,
        };
        ReactionTransition {
            previous: self,
            next,
        }
    }
}

impl ReactionTransition {
    pub fn points_delta(&self) -> i32 {
        (self.next as i32) - (self.previous as i32)
    }

    pub fn action(&self) -> ReactionAction {
        match (self.previous, self.next) {
            (ReactionState::NoReaction, _) => ReactionAction::Create,
            (_, ReactionState::NoReaction) => ReactionAction::Retract,
            _ => ReactionAction::Flip,
        }
    }

    /// `is_like` value of the reaction after the transition, None if it is retracted.
    pub fn next_is_like(&self) -> Option<bool> {
        match self.next {
            ReactionState::Liked => Some(true),
            ReactionState::Disliked => Some(false),
            ReactionState::NoReaction => None,
        }
    }
}

impl ReactionTarget {
    pub fn id(&self) -> i64 {
        match self {
            ReactionTarget::Post(post_id) => *post_id,
            ReactionTarget::Comment(comment_id) => *comment_id,
        }
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionTarget::Post(post_id) => write!(f, "post {post_id}"),
            ReactionTarget::Comment(comment_id) => write!(f, "comment {comment_id}"),
        }
    }
}

impl Reaction {
    pub fn state(&self) -> ReactionState {
        ReactionState::from_is_like(self.is_like)
    }
}

/// Formats points for display, e.g. `1234` is shown as `1.2k`.
///
/// Thousands are truncated to one decimal and a zero decimal is omitted, so `1050` is shown as `1k` and not `1.0k`.
///
/// ```
/// use threadboard_core::ranking::points_text;
///
/// assert_eq!(points_text(999), "999");
/// assert_eq!(points_text(-999), "-999");
/// assert_eq!(points_text(1000), "1k");
/// assert_eq!(points_text(1299), "1.2k");
/// assert_eq!(points_text(-1500), "-1.5k");
/// assert_eq!(points_text(999_999), "999.9k");
/// assert_eq!(points_text(1_000_000), ">1M");
/// assert_eq!(points_text(-1_000_000), "<-1M");
/// ```
pub fn points_text(points: i32) -> String {
    let absolute_points = points.unsigned_abs();
    if absolute_points < THOUSAND as u32 {
        points.to_string()
    } else if absolute_points < MILLION as u32 {
        let tenths = points / (THOUSAND / 10);
        match tenths % 10 {
            0 => format!("{}k", tenths / 10),
            decimal => format!("{}.{}k", tenths / 10, decimal.abs()),
        }
    } else if points > 0 {
        String::from(">1M")
    } else {
        String::from("<-1M")
    }
}

/// Like (`is_like = true`) or dislike the post `post_id`. Repeating the current reaction retracts it.
pub async fn react_to_post(
    post_id: i64,
    is_like: bool,
    user: Option<&User>,
    state: &ForumState,
) -> Result<PostReaction, AppError> {
    log::trace!("React to post {post_id}, is_like = {is_like}");
    let user = check_user(user)?;
    let (reaction, post) = state.store.apply_post_reaction(user.user_id, post_id, is_like).await?;
    state.notification_bus.publish(Notification::PostReacted {
        post_id,
        trigger_user_id: user.user_id,
        points: post.points,
    });
    Ok(PostReaction { reaction, post })
}

/// Like (`is_like = true`) or dislike the comment `comment_id`. Repeating the current reaction retracts it.
pub async fn react_to_comment(
    comment_id: i64,
    is_like: bool,
    user: Option<&User>,
    state: &ForumState,
) -> Result<CommentReaction, AppError> {
    log::trace!("React to comment {comment_id}, is_like = {is_like}");
    let user = check_user(user)?;
    let (reaction, comment) = state.store.apply_comment_reaction(user.user_id, comment_id, is_like).await?;
    state.notification_bus.publish(Notification::CommentReacted {
        post_id: comment.post_id,
        comment_id,
        trigger_user_id: user.user_id,
        points: comment.points,
    });
    Ok(CommentReaction { reaction, comment })
}

#[cfg(feature = "ssr")]
pub mod ssr {
    use std::fmt;
    use std::future::Future;

    use sqlx::postgres::PgRow;
    use sqlx::{FromRow, PgPool, Postgres, Transaction};

    use threadboard_utils::errors::AppError;

    use crate::ranking::{ReactionAction, ReactionState, Reaction, ReactionTarget};

    const SERIALIZATION_FAILURE_CODE: &str = "40001";
    const DEADLOCK_DETECTED_CODE: &str = "40P01";

    #[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
    pub struct SqlReaction {
        pub reaction_id: i64,
        pub user_id: i64,
        pub is_like: bool,
        pub create_timestamp: chrono::DateTime<chrono::Utc>,
    }

    struct ReactionQueries {
        lock_target: &'static str,
        select_reaction: &'static str,
        insert_reaction: &'static str,
        update_reaction: &'static str,
        delete_reaction: &'static str,
        update_points: &'static str,
    }

    const POST_REACTION_QUERIES: ReactionQueries = ReactionQueries {
        lock_target: "SELECT points FROM posts WHERE post_id = $1 FOR UPDATE",
        select_reaction: "SELECT reaction_id, user_id, is_like, create_timestamp FROM post_reactions
            WHERE user_id = $1 AND post_id = $2",
        insert_reaction: "INSERT INTO post_reactions (user_id, post_id, is_like) VALUES ($1, $2, $3)
            RETURNING reaction_id, user_id, is_like, create_timestamp",
        update_reaction: "UPDATE post_reactions SET is_like = $1 WHERE reaction_id = $2
            RETURNING reaction_id, user_id, is_like, create_timestamp",
        delete_reaction: "DELETE FROM post_reactions WHERE reaction_id = $1",
        update_points: "UPDATE posts SET points = points + $1 WHERE post_id = $2 RETURNING *",
    };

    const COMMENT_REACTION_QUERIES: ReactionQueries = ReactionQueries {
        lock_target: "SELECT points FROM comments WHERE comment_id = $1 AND NOT is_deleted FOR UPDATE",
        select_reaction: "SELECT reaction_id, user_id, is_like, create_timestamp FROM comment_reactions
            WHERE user_id = $1 AND comment_id = $2",
        insert_reaction: "INSERT INTO comment_reactions (user_id, comment_id, is_like) VALUES ($1, $2, $3)
            RETURNING reaction_id, user_id, is_like, create_timestamp",
        update_reaction: "UPDATE comment_reactions SET is_like = $1 WHERE reaction_id = $2
            RETURNING reaction_id, user_id, is_like, create_timestamp",
        delete_reaction: "DELETE FROM comment_reactions WHERE reaction_id = $1",
        update_points: "UPDATE comments SET points = points + $1 WHERE comment_id = $2 RETURNING *",
    };

    impl SqlReaction {
        pub fn into_reaction(self, target: ReactionTarget) -> Reaction {
            Reaction {
                reaction_id: self.reaction_id,
                user_id: self.user_id,
                target,
                is_like: self.is_like,
                create_timestamp: self.create_timestamp,
            }
        }
    }

    fn get_reaction_queries(target: ReactionTarget) -> &'static ReactionQueries {
        match target {
            ReactionTarget::Post(_) => &POST_REACTION_QUERIES,
            ReactionTarget::Comment(_) => &COMMENT_REACTION_QUERIES,
        }
    }

    fn is_transient_error(error: &sqlx::Error) -> bool {
        match error {
            sqlx::Error::Database(db_error) => db_error
                .code()
                .is_some_and(|code| code == SERIALIZATION_FAILURE_CODE || code == DEADLOCK_DETECTED_CODE),
            _ => false,
        }
    }

    pub async fn get_user_reaction(
        user_id: i64,
        target: ReactionTarget,
        db_pool: &PgPool,
    ) -> Result<Option<Reaction>, AppError> {
        let reaction = sqlx::query_as::<_, SqlReaction>(get_reaction_queries(target).select_reaction)
            .bind(user_id)
            .bind(target.id())
            .fetch_optional(db_pool)
            .await?;

        Ok(reaction.map(|reaction| reaction.into_reaction(target)))
    }

    /// Applies a reaction of `user_id` on `target` and the resulting points delta in a single transaction.
    ///
    /// The target row is locked for the duration of the transaction, so that concurrent reactions on the same
    /// target are serialized. `T` is the row type of the updated target. A transaction failing with a
    /// serialization failure or a deadlock is retried once.
    pub async fn apply_reaction<T>(
        user_id: i64,
        target: ReactionTarget,
        is_like: bool,
        db_pool: &PgPool,
    ) -> Result<(Option<Reaction>, T), AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let result = retry_once_on(
            is_transient_error,
            || try_apply_reaction::<T>(user_id, target, is_like, db_pool),
        ).await;
        Ok(result?)
    }

    /// Runs `operation` a second time if its first attempt fails with an error for which `is_transient` is true.
    pub async fn retry_once_on<R, E, F, Fut>(
        is_transient: impl Fn(&E) -> bool,
        mut operation: F,
    ) -> Result<R, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        match operation().await {
            Err(error) if is_transient(&error) => {
                log::warn!("Transient failure, retry once: {error}");
                operation().await
            },
            result => result,
        }
    }

    async fn try_apply_reaction<T>(
        user_id: i64,
        target: ReactionTarget,
        is_like: bool,
        db_pool: &PgPool,
    ) -> Result<(Option<Reaction>, T), sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let queries = get_reaction_queries(target);
        let mut transaction = db_pool.begin().await?;

        let points = sqlx::query_scalar::<_, i32>(queries.lock_target)
            .bind(target.id())
            .fetch_one(&mut *transaction)
            .await?;

        let current_reaction = sqlx::query_as::<_, SqlReaction>(queries.select_reaction)
            .bind(user_id)
            .bind(target.id())
            .fetch_optional(&mut *transaction)
            .await?;

        let transition = current_reaction
            .as_ref()
            .map(|reaction| ReactionState::from_is_like(reaction.is_like))
            .unwrap_or_default()
            .apply(is_like);
        log::debug!("Reaction of user {user_id} on {target} with {points} points: {transition:?}");

        let reaction = write_reaction(user_id, target, is_like, current_reaction, transition.action(), queries, &mut transaction).await?;

        let updated_target = sqlx::query_as::<_, T>(queries.update_points)
            .bind(transition.points_delta())
            .bind(target.id())
            .fetch_one(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok((reaction.map(|reaction| reaction.into_reaction(target)), updated_target))
    }

    async fn write_reaction(
        user_id: i64,
        target: ReactionTarget,
        is_like: bool,
        current_reaction: Option<SqlReaction>,
        action: ReactionAction,
        queries: &ReactionQueries,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<SqlReaction>, sqlx::Error> {
        match (action, current_reaction) {
            (ReactionAction::Create, _) => {
                let reaction = sqlx::query_as::<_, SqlReaction>(queries.insert_reaction)
                    .bind(user_id)
                    .bind(target.id())
                    .bind(is_like)
                    .fetch_one(&mut **transaction)
                    .await?;
                Ok(Some(reaction))
            },
            (ReactionAction::Flip, Some(current_reaction)) => {
                let reaction = sqlx::query_as::<_, SqlReaction>(queries.update_reaction)
                    .bind(is_like)
                    .bind(current_reaction.reaction_id)
                    .fetch_one(&mut **transaction)
                    .await?;
                Ok(Some(reaction))
            },
            (ReactionAction::Retract, Some(current_reaction)) => {
                sqlx::query(queries.delete_reaction)
                    .bind(current_reaction.reaction_id)
                    .execute(&mut **transaction)
                    .await?;
                Ok(None)
            },
            (_, None) => Err(sqlx::Error::RowNotFound),
        }
    }

}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::ranking::{points_text, CommentSortType, PostSortType, Reaction, ReactionAction, ReactionState, ReactionTarget, ReactionTransition};
    use threadboard_utils::constants::{BEST_ORDER_BY_COLUMN, RECENT_ORDER_BY_COLUMN};

    #[test]
    fn test_reaction_state_apply() {
        let expected_transition_vec = [
            (ReactionState::NoReaction, true, ReactionState::Liked, 1, ReactionAction::Create),
            (ReactionState::NoReaction, false, ReactionState::Disliked, -1, ReactionAction::Create),
            (ReactionState::Liked, true, ReactionState::NoReaction, -1, ReactionAction::Retract),
            (ReactionState::Liked, false, ReactionState::Disliked, -2, ReactionAction::Flip),
            (ReactionState::Disliked, false, ReactionState::NoReaction, 1, ReactionAction::Retract),
            (ReactionState::Disliked, true, ReactionState::Liked, 2, ReactionAction::Flip),
        ];

        for (previous, is_like, next, points_delta, action) in expected_transition_vec {
            let transition = previous.apply(is_like);
            assert_eq!(transition, ReactionTransition { previous, next });
            assert_eq!(transition.points_delta(), points_delta);
            assert_eq!(transition.action(), action);
        }
    }

    #[test]
    fn test_reaction_transition_next_is_like() {
        assert_eq!(ReactionState::NoReaction.apply(true).next_is_like(), Some(true));
        assert_eq!(ReactionState::Liked.apply(false).next_is_like(), Some(false));
        assert_eq!(ReactionState::Disliked.apply(false).next_is_like(), None);
    }

    #[test]
    fn test_repeated_reaction_is_neutral() {
        for is_like in [true, false] {
            let first = ReactionState::NoReaction.apply(is_like);
            let second = first.next.apply(is_like);
            assert_eq!(second.next, ReactionState::NoReaction);
            assert_eq!(first.points_delta() + second.points_delta(), 0);
        }
    }

    #[test]
    fn test_reaction_state_from_reaction() {
        let mut reaction = Reaction {
            reaction_id: 1,
            user_id: 2,
            target: ReactionTarget::Post(3),
            is_like: true,
            create_timestamp: chrono::Utc::now(),
        };
        assert_eq!(reaction.state(), ReactionState::Liked);
        assert_eq!(ReactionState::from_reaction(Some(&reaction)), ReactionState::Liked);
        reaction.is_like = false;
        assert_eq!(reaction.state(), ReactionState::Disliked);
        assert_eq!(ReactionState::from_reaction(Some(&reaction)), ReactionState::Disliked);
        assert_eq!(ReactionState::from_reaction(None), ReactionState::NoReaction);
    }

    #[test]
    fn test_reaction_target() {
        assert_eq!(ReactionTarget::Post(3).id(), 3);
        assert_eq!(ReactionTarget::Comment(5).id(), 5);
        assert_eq!(ReactionTarget::Post(3).to_string(), "post 3");
        assert_eq!(ReactionTarget::Comment(5).to_string(), "comment 5");
    }

    #[test]
    fn test_sort_type() {
        assert_eq!(PostSortType::Best.to_order_by_code(), BEST_ORDER_BY_COLUMN);
        assert_eq!(PostSortType::Recent.to_order_by_code(), RECENT_ORDER_BY_COLUMN);
        assert_eq!(CommentSortType::Best.to_order_by_code(), BEST_ORDER_BY_COLUMN);
        assert_eq!(CommentSortType::Recent.to_order_by_code(), RECENT_ORDER_BY_COLUMN);
        assert_eq!(CommentSortType::Recent.to_string(), "Recent");
        assert_eq!(PostSortType::from_str("Best"), Ok(PostSortType::Best));
        assert!(CommentSortType::from_str("Hot").is_err());
    }

    #[test]
    fn test_points_text() {
        assert_eq!(points_text(0), "0");
        assert_eq!(points_text(-12), "-12");
        assert_eq!(points_text(1050), "1k");
        assert_eq!(points_text(1234), "1.2k");
        assert_eq!(points_text(-1234), "-1.2k");
        assert_eq!(points_text(10_000), "10k");
        assert_eq!(points_text(123_456), "123.4k");
        assert_eq!(points_text(i32::MAX), ">1M");
        assert_eq!(points_text(i32::MIN), "<-1M");
    }
}

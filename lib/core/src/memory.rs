use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use threadboard_auth::user::User;
use threadboard_utils::errors::AppError;
use threadboard_utils::lock_cache::LockCache;

use crate::comment::{Comment, CommentDeletion, CommentWithChildren};
use crate::post::{Post, PostInput, PostUpdate};
use crate::ranking::{CommentSortType, PostSortType, Reaction, ReactionAction, ReactionState, ReactionTarget, ReactionTransition};
use crate::store::ContentStore;

#[derive(Debug, Default)]
struct MemoryTables {
    post_map: BTreeMap<i64, Post>,
    comment_map: BTreeMap<i64, Comment>,
    reaction_map: HashMap<(i64, ReactionTarget), Reaction>,
    last_post_id: i64,
    last_comment_id: i64,
    last_reaction_id: i64,
}

/// In-memory implementation of [`ContentStore`].
///
/// Reactions on a target are serialized with a lock per target. The reaction row and the points of the target are
/// written under a single write guard, so a cancelled reaction never leaves a partial update behind.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
    target_lock_cache: LockCache<ReactionTarget>,
}

impl MemoryTables {
    fn next_post_id(&mut self) -> i64 {
        self.last_post_id += 1;
        self.last_post_id
    }

    fn next_comment_id(&mut self) -> i64 {
        self.last_comment_id += 1;
        self.last_comment_id
    }

    fn next_reaction_id(&mut self) -> i64 {
        self.last_reaction_id += 1;
        self.last_reaction_id
    }

    fn get_active_comment(&self, comment_id: i64) -> Result<&Comment, AppError> {
        match self.comment_map.get(&comment_id) {
            Some(comment) if !comment.is_deleted => Ok(comment),
            _ => Err(AppError::NotFound),
        }
    }

    fn get_post(&self, post_id: i64) -> Result<Post, AppError> {
        self.post_map.get(&post_id).cloned().ok_or(AppError::NotFound)
    }

    fn get_target_points(&self, target: ReactionTarget) -> Result<i32, AppError> {
        match target {
            ReactionTarget::Post(post_id) => self.post_map.get(&post_id).map(|post| post.points).ok_or(AppError::NotFound),
            ReactionTarget::Comment(comment_id) => self.get_active_comment(comment_id).map(|comment| comment.points),
        }
    }

    fn set_target_points(&mut self, target: ReactionTarget, points: i32) -> Result<(), AppError> {
        let target_points = match target {
            ReactionTarget::Post(post_id) => self.post_map.get_mut(&post_id).map(|post| &mut post.points),
            ReactionTarget::Comment(comment_id) => self.comment_map
                .get_mut(&comment_id)
                .filter(|comment| !comment.is_deleted)
                .map(|comment| &mut comment.points),
        };
        *target_points.ok_or(AppError::NotFound)? = points;
        Ok(())
    }

    fn write_reaction(
        &mut self,
        user_id: i64,
        target: ReactionTarget,
        transition: ReactionTransition,
    ) -> Option<Reaction> {
        let key = (user_id, target);
        match (transition.action(), transition.next_is_like()) {
            (ReactionAction::Create, Some(is_like)) => {
                let reaction = Reaction {
                    reaction_id: self.next_reaction_id(),
                    user_id,
                    target,
                    is_like,
                    create_timestamp: Utc::now(),
                };
                self.reaction_map.insert(key, reaction.clone());
                Some(reaction)
            },
            (ReactionAction::Flip, Some(is_like)) => {
                self.reaction_map.get_mut(&key).map(|reaction| {
                    reaction.is_like = is_like;
                    reaction.clone()
                })
            },
            _ => {
                self.reaction_map.remove(&key);
                None
            },
        }
    }

    fn remove_target_reactions(&mut self, target: ReactionTarget) {
        self.reaction_map.retain(|(_, reaction_target), _| *reaction_target != target);
    }
}

impl MemoryStore {
    pub fn new(target_lock_cache_size: NonZeroUsize) -> Self {
        Self {
            tables: RwLock::new(MemoryTables::default()),
            target_lock_cache: LockCache::new(target_lock_cache_size),
        }
    }

    /// Applies the reaction and returns the target read with `get_target` under the same write guard, so that the
    /// returned points are the ones written by this reaction.
    async fn apply_reaction<T>(
        &self,
        user_id: i64,
        target: ReactionTarget,
        is_like: bool,
        get_target: impl FnOnce(&MemoryTables) -> Result<T, AppError>,
    ) -> Result<(Option<Reaction>, T), AppError> {
        let target_lock = self.target_lock_cache.get_lock(&target).await;
        let _target_guard = target_lock.lock().await;

        let (points, current_reaction) = {
            let tables = self.tables.read().await;
            (tables.get_target_points(target)?, tables.reaction_map.get(&(user_id, target)).cloned())
        };

        // other tasks can run between the read and the write, the target lock keeps them off this target
        tokio::task::yield_now().await;

        let transition = ReactionState::from_reaction(current_reaction.as_ref()).apply(is_like);
        log::debug!("Reaction of user {user_id} on {target} with {points} points: {transition:?}");

        let mut tables = self.tables.write().await;
        tables.set_target_points(target, points + transition.points_delta())?;
        let reaction = tables.write_reaction(user_id, target, transition);
        Ok((reaction, get_target(&*tables)?))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn create_post(&self, post_input: &PostInput, user: &User) -> Result<Post, AppError> {
        let mut tables = self.tables.write().await;
        let post = Post {
            post_id: tables.next_post_id(),
            title: post_input.title.clone(),
            body: post_input.body.clone(),
            creator_id: user.user_id,
            creator_name: user.username.clone(),
            points: 0,
            media: post_input.media.clone(),
            create_timestamp: Utc::now(),
            edit_timestamp: None,
        };
        tables.post_map.insert(post.post_id, post.clone());
        Ok(post)
    }

    async fn get_post_by_id(&self, post_id: i64) -> Result<Post, AppError> {
        let tables = self.tables.read().await;
        tables.get_post(post_id)
    }

    async fn get_post_vec(&self, sort_type: PostSortType, limit: i64, offset: i64) -> Result<Vec<Post>, AppError> {
        let tables = self.tables.read().await;
        let mut post_vec: Vec<Post> = tables.post_map.values().cloned().collect();
        match sort_type {
            PostSortType::Best => post_vec.sort_by_key(|post| Reverse((post.points, post.post_id))),
            PostSortType::Recent => post_vec.sort_by_key(|post| Reverse((post.create_timestamp, post.post_id))),
        }
        Ok(post_vec
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or_default())
            .take(usize::try_from(limit).unwrap_or_default())
            .collect())
    }

    async fn update_post(&self, post_id: i64, post_update: &PostUpdate) -> Result<Post, AppError> {
        let mut tables = self.tables.write().await;
        let post = tables.post_map.get_mut(&post_id).ok_or(AppError::NotFound)?;
        post_update.apply_to(post);
        post.edit_timestamp = Some(Utc::now());
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.post_map.remove(&post_id).ok_or(AppError::NotFound)?;
        let comment_id_vec: Vec<i64> = tables.comment_map
            .values()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| comment.comment_id)
            .collect();
        for comment_id in comment_id_vec {
            tables.comment_map.remove(&comment_id);
            tables.remove_target_reactions(ReactionTarget::Comment(comment_id));
        }
        tables.remove_target_reactions(ReactionTarget::Post(post_id));
        Ok(())
    }

    async fn create_comment(
        &self,
        post_id: i64,
        parent_comment_id: Option<i64>,
        body: &str,
        user: &User,
    ) -> Result<Comment, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.post_map.contains_key(&post_id) {
            return Err(AppError::NotFound);
        }
        if let Some(parent_comment_id) = parent_comment_id {
            tables.get_active_comment(parent_comment_id)?;
        }
        let comment = Comment {
            comment_id: tables.next_comment_id(),
            body: String::from(body),
            creator_id: user.user_id,
            creator_name: user.username.clone(),
            post_id,
            parent_id: parent_comment_id,
            points: 0,
            is_deleted: false,
            create_timestamp: Utc::now(),
            edit_timestamp: None,
        };
        tables.comment_map.insert(comment.comment_id, comment.clone());
        Ok(comment)
    }

    async fn get_comment_by_id(&self, comment_id: i64) -> Result<Comment, AppError> {
        let tables = self.tables.read().await;
        tables.comment_map.get(&comment_id).cloned().ok_or(AppError::NotFound)
    }

    async fn get_post_comment_vec(
        &self,
        post_id: i64,
        sort_type: CommentSortType,
        user_id: Option<i64>,
    ) -> Result<Vec<CommentWithChildren>, AppError> {
        let tables = self.tables.read().await;
        let mut comment_vec: Vec<&Comment> = tables.comment_map
            .values()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        match sort_type {
            CommentSortType::Best => comment_vec.sort_by_key(|comment| Reverse((comment.points, comment.comment_id))),
            CommentSortType::Recent => comment_vec.sort_by_key(|comment| Reverse((comment.create_timestamp, comment.comment_id))),
        }
        Ok(comment_vec
            .into_iter()
            .map(|comment| {
                let reaction = user_id.and_then(|user_id| {
                    tables.reaction_map.get(&(user_id, ReactionTarget::Comment(comment.comment_id))).cloned()
                });
                CommentWithChildren::new(comment.clone(), reaction)
            })
            .collect())
    }

    async fn update_comment(&self, comment_id: i64, body: &str) -> Result<Comment, AppError> {
        let mut tables = self.tables.write().await;
        let comment = tables.comment_map
            .get_mut(&comment_id)
            .filter(|comment| !comment.is_deleted)
            .ok_or(AppError::NotFound)?;
        comment.body = String::from(body);
        comment.edit_timestamp = Some(Utc::now());
        Ok(comment.clone())
    }

    async fn count_child_comments(&self, comment_id: i64) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        let child_count = tables.comment_map
            .values()
            .filter(|comment| comment.parent_id == Some(comment_id))
            .count();
        Ok(child_count as i64)
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<CommentDeletion, AppError> {
        let mut tables = self.tables.write().await;
        let has_child = tables.comment_map
            .values()
            .any(|comment| comment.parent_id == Some(comment_id));
        let comment = tables.comment_map.get_mut(&comment_id).ok_or(AppError::NotFound)?;
        if comment.is_deleted {
            return Ok(CommentDeletion::Tombstoned(comment.clone()));
        }
        if has_child {
            comment.is_deleted = true;
            comment.edit_timestamp = Some(Utc::now());
            Ok(CommentDeletion::Tombstoned(comment.clone()))
        } else {
            tables.comment_map.remove(&comment_id);
            tables.remove_target_reactions(ReactionTarget::Comment(comment_id));
            Ok(CommentDeletion::Removed)
        }
    }

    async fn get_user_reaction(&self, user_id: i64, target: ReactionTarget) -> Result<Option<Reaction>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.reaction_map.get(&(user_id, target)).cloned())
    }

    async fn apply_post_reaction(
        &self,
        user_id: i64,
        post_id: i64,
        is_like: bool,
    ) -> Result<(Option<Reaction>, Post), AppError> {
        self.apply_reaction(user_id, ReactionTarget::Post(post_id), is_like, |tables| tables.get_post(post_id)).await
    }

    async fn apply_comment_reaction(
        &self,
        user_id: i64,
        comment_id: i64,
        is_like: bool,
    ) -> Result<(Option<Reaction>, Comment), AppError> {
        self.apply_reaction(
            user_id,
            ReactionTarget::Comment(comment_id),
            is_like,
            |tables| tables.get_active_comment(comment_id).cloned(),
        ).await
    }
}

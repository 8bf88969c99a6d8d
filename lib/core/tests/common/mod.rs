#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;

use threadboard_auth::user::User;
use threadboard_core::comment::{create_comment, Comment, CommentWithChildren};
use threadboard_core::memory::MemoryStore;
use threadboard_core::notification::NotificationBus;
use threadboard_core::post::{create_post, Post, PostInput};
use threadboard_core::state::ForumState;

pub const TEST_LOCK_CACHE_SIZE: usize = 100;

pub fn create_memory_state() -> ForumState {
    let lock_cache_size = NonZeroUsize::new(TEST_LOCK_CACHE_SIZE).expect("Lock cache size should be non zero.");
    ForumState::new(Arc::new(MemoryStore::new(lock_cache_size)), NotificationBus::default())
}

pub fn create_test_user(user_id: i64) -> User {
    User::new(user_id, &format!("user{user_id}")).expect("Should create test user.")
}

pub fn create_post_input(title: &str) -> PostInput {
    PostInput {
        title: String::from(title),
        body: format!("body of {title}"),
        media: None,
    }
}

pub async fn create_test_post(user: &User, state: &ForumState) -> Post {
    create_post(create_post_input("post"), Some(user), state).await.expect("Should create post.")
}

pub async fn create_test_comment(
    post_id: i64,
    parent_comment_id: Option<i64>,
    user: &User,
    state: &ForumState,
) -> Comment {
    create_comment(post_id, parent_comment_id, "comment", Some(user), state)
        .await
        .expect("Should create comment.")
}

/// Returns the (comment_id, child comment ids) of every node of the tree, depth first.
pub fn get_id_tree(comment_tree: &[CommentWithChildren]) -> Vec<(i64, Vec<i64>)> {
    let mut id_tree = Vec::new();
    for comment in comment_tree {
        id_tree.push((
            comment.comment.comment_id,
            comment.child_comments.iter().map(|child| child.comment.comment_id).collect(),
        ));
        id_tree.append(&mut get_id_tree(&comment.child_comments));
    }
    id_tree
}

pub fn count_nodes(comment_tree: &[CommentWithChildren]) -> usize {
    comment_tree.iter().map(|comment| 1 + count_nodes(&comment.child_comments)).sum()
}

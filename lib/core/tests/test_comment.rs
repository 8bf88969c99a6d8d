use threadboard_core::comment::{
    create_comment, delete_comment, get_comment_by_id, get_post_comment_tree, update_comment, CommentDeletion,
};
use threadboard_core::ranking::{react_to_comment, CommentSortType, ReactionTarget};
use threadboard_core::store::ContentStore;
use threadboard_utils::constants::DELETED_MESSAGE;
use threadboard_utils::errors::AppError;

use crate::common::*;

mod common;

#[tokio::test]
async fn test_get_post_comment_tree() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let post = create_test_post(&user, &state).await;

    let comment_1 = create_test_comment(post.post_id, None, &user, &state).await;
    let comment_2 = create_test_comment(post.post_id, Some(comment_1.comment_id), &user, &state).await;
    let comment_3 = create_test_comment(post.post_id, Some(comment_1.comment_id), &user, &state).await;
    let comment_4 = create_test_comment(post.post_id, Some(comment_2.comment_id), &user, &state).await;

    // Recent sorts siblings from newest to oldest
    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Recent, None, &state).await?;
    assert_eq!(comment_tree.len(), 1);
    assert_eq!(count_nodes(&comment_tree), 4);
    assert_eq!(
        get_id_tree(&comment_tree),
        vec![
            (comment_1.comment_id, vec![comment_3.comment_id, comment_2.comment_id]),
            (comment_3.comment_id, vec![]),
            (comment_2.comment_id, vec![comment_4.comment_id]),
            (comment_4.comment_id, vec![]),
        ]
    );
    assert_eq!(comment_tree[0].comment, comment_1);

    // Best sorts siblings by points
    react_to_comment(comment_2.comment_id, true, Some(&user), &state).await?;
    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Best, None, &state).await?;
    assert_eq!(
        get_id_tree(&comment_tree),
        vec![
            (comment_1.comment_id, vec![comment_2.comment_id, comment_3.comment_id]),
            (comment_2.comment_id, vec![comment_4.comment_id]),
            (comment_4.comment_id, vec![]),
            (comment_3.comment_id, vec![]),
        ]
    );

    let other_post = create_test_post(&user, &state).await;
    assert!(get_post_comment_tree(other_post.post_id, CommentSortType::Best, None, &state).await?.is_empty());
    assert_eq!(
        get_post_comment_tree(other_post.post_id + 1, CommentSortType::Best, None, &state).await,
        Err(AppError::NotFound)
    );

    Ok(())
}

#[tokio::test]
async fn test_get_post_comment_tree_with_reaction() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let other_user = create_test_user(2);
    let post = create_test_post(&user, &state).await;
    let root_comment = create_test_comment(post.post_id, None, &user, &state).await;
    let child_comment = create_test_comment(post.post_id, Some(root_comment.comment_id), &user, &state).await;

    react_to_comment(child_comment.comment_id, false, Some(&other_user), &state).await?;

    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Best, Some(&other_user), &state).await?;
    assert_eq!(comment_tree.len(), 1);
    assert_eq!(comment_tree[0].reaction, None);
    let child_reaction = comment_tree[0].child_comments[0].reaction.clone().expect("Child comment should have reaction.");
    assert_eq!(child_reaction.user_id, other_user.user_id);
    assert_eq!(child_reaction.target, ReactionTarget::Comment(child_comment.comment_id));
    assert!(!child_reaction.is_like);
    assert_eq!(comment_tree[0].child_comments[0].comment.points, -1);

    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Best, Some(&user), &state).await?;
    assert_eq!(comment_tree[0].child_comments[0].reaction, None);

    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Best, None, &state).await?;
    assert_eq!(comment_tree[0].child_comments[0].reaction, None);

    Ok(())
}

#[tokio::test]
async fn test_get_post_comment_tree_redacts_deleted_comments() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let post = create_test_post(&user, &state).await;
    let root_comment = create_comment(post.post_id, None, "secret", Some(&user), &state).await?;
    let child_comment = create_test_comment(post.post_id, Some(root_comment.comment_id), &user, &state).await;
    react_to_comment(root_comment.comment_id, true, Some(&user), &state).await?;

    delete_comment(root_comment.comment_id, Some(&user), &state).await?;

    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Best, Some(&user), &state).await?;
    assert_eq!(comment_tree.len(), 1);
    let deleted_comment = &comment_tree[0];
    assert!(deleted_comment.comment.is_deleted);
    assert_eq!(deleted_comment.comment.body, DELETED_MESSAGE);
    assert_eq!(deleted_comment.comment.creator_name, DELETED_MESSAGE);
    assert_eq!(deleted_comment.reaction, None);
    assert_eq!(deleted_comment.child_comments.len(), 1);
    assert_eq!(deleted_comment.child_comments[0].comment, child_comment);

    // the body is retained in storage
    let stored_comment = get_comment_by_id(root_comment.comment_id, &state).await?;
    assert_eq!(stored_comment.body, "secret");
    assert_eq!(stored_comment.creator_name, user.username);
    assert_eq!(stored_comment.points, 1);

    Ok(())
}

#[tokio::test]
async fn test_create_comment() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let post = create_test_post(&user, &state).await;
    let other_post = create_test_post(&user, &state).await;

    let comment = create_comment(post.post_id, None, "comment", Some(&user), &state).await?;
    assert_eq!(comment.body, "comment");
    assert_eq!(comment.post_id, post.post_id);
    assert_eq!(comment.parent_id, None);
    assert_eq!(comment.creator_id, user.user_id);
    assert_eq!(comment.creator_name, user.username);
    assert_eq!(comment.points, 0);
    assert!(!comment.is_deleted);
    assert_eq!(comment.edit_timestamp, None);
    assert_eq!(get_comment_by_id(comment.comment_id, &state).await?, comment);

    let reply = create_comment(post.post_id, Some(comment.comment_id), "reply", Some(&user), &state).await?;
    assert_eq!(reply.parent_id, Some(comment.comment_id));

    assert_eq!(create_comment(post.post_id, None, "comment", None, &state).await, Err(AppError::Unauthorized));
    assert!(matches!(
        create_comment(post.post_id, None, "", Some(&user), &state).await,
        Err(AppError::ValidationError(_))
    ));
    assert!(matches!(
        create_comment(post.post_id, None, "  \n", Some(&user), &state).await,
        Err(AppError::ValidationError(_))
    ));
    assert_eq!(
        create_comment(other_post.post_id + 1, None, "comment", Some(&user), &state).await,
        Err(AppError::NotFound)
    );
    assert_eq!(
        create_comment(post.post_id, Some(reply.comment_id + 1), "comment", Some(&user), &state).await,
        Err(AppError::NotFound)
    );
    assert!(matches!(
        create_comment(other_post.post_id, Some(comment.comment_id), "comment", Some(&user), &state).await,
        Err(AppError::ValidationError(_))
    ));

    delete_comment(comment.comment_id, Some(&user), &state).await?;
    assert!(matches!(
        create_comment(post.post_id, Some(comment.comment_id), "comment", Some(&user), &state).await,
        Err(AppError::ValidationError(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_update_comment() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let other_user = create_test_user(2);
    let post = create_test_post(&user, &state).await;
    let comment = create_test_comment(post.post_id, None, &user, &state).await;

    assert_eq!(update_comment(comment.comment_id, "edited", None, &state).await, Err(AppError::Unauthorized));
    assert_eq!(
        update_comment(comment.comment_id, "edited", Some(&other_user), &state).await,
        Err(AppError::Unauthorized)
    );
    assert_eq!(get_comment_by_id(comment.comment_id, &state).await?, comment);
    assert!(matches!(
        update_comment(comment.comment_id, "", Some(&user), &state).await,
        Err(AppError::ValidationError(_))
    ));
    assert_eq!(
        update_comment(comment.comment_id + 1, "edited", Some(&user), &state).await,
        Err(AppError::NotFound)
    );

    let updated_comment = update_comment(comment.comment_id, "edited", Some(&user), &state).await?;
    assert_eq!(updated_comment.body, "edited");
    assert_eq!(updated_comment.comment_id, comment.comment_id);
    assert_eq!(updated_comment.create_timestamp, comment.create_timestamp);
    assert!(updated_comment.edit_timestamp.is_some());
    assert_eq!(get_comment_by_id(comment.comment_id, &state).await?, updated_comment);

    create_test_comment(post.post_id, Some(comment.comment_id), &user, &state).await;
    delete_comment(comment.comment_id, Some(&user), &state).await?;
    assert_eq!(
        update_comment(comment.comment_id, "edited again", Some(&user), &state).await,
        Err(AppError::NotFound)
    );

    Ok(())
}

#[tokio::test]
async fn test_delete_comment() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let other_user = create_test_user(2);
    let post = create_test_post(&user, &state).await;
    let parent_comment = create_test_comment(post.post_id, None, &user, &state).await;
    let child_comment = create_test_comment(post.post_id, Some(parent_comment.comment_id), &other_user, &state).await;

    assert_eq!(delete_comment(parent_comment.comment_id, None, &state).await, Err(AppError::Unauthorized));
    assert_eq!(
        delete_comment(parent_comment.comment_id, Some(&other_user), &state).await,
        Err(AppError::Unauthorized)
    );
    assert_eq!(get_comment_by_id(parent_comment.comment_id, &state).await?, parent_comment);
    assert_eq!(
        delete_comment(child_comment.comment_id + 1, Some(&user), &state).await,
        Err(AppError::NotFound)
    );

    // comment with a child is kept as tombstone
    let comment_deletion = delete_comment(parent_comment.comment_id, Some(&user), &state).await?;
    let tombstone = get_comment_by_id(parent_comment.comment_id, &state).await?;
    assert_eq!(comment_deletion, CommentDeletion::Tombstoned(tombstone.clone()));
    assert!(tombstone.is_deleted);
    assert_eq!(tombstone.body, parent_comment.body);
    assert_eq!(tombstone.points, parent_comment.points);

    // deleting a tombstone again is a no-op
    assert_eq!(
        delete_comment(parent_comment.comment_id, Some(&user), &state).await?,
        CommentDeletion::Tombstoned(tombstone.clone())
    );

    // comment without child is removed
    assert_eq!(
        delete_comment(child_comment.comment_id, Some(&other_user), &state).await?,
        CommentDeletion::Removed
    );
    assert_eq!(get_comment_by_id(child_comment.comment_id, &state).await, Err(AppError::NotFound));
    assert_eq!(get_comment_by_id(parent_comment.comment_id, &state).await?, tombstone);

    let comment_tree = get_post_comment_tree(post.post_id, CommentSortType::Best, None, &state).await?;
    assert_eq!(get_id_tree(&comment_tree), vec![(parent_comment.comment_id, vec![])]);

    Ok(())
}

#[tokio::test]
async fn test_count_child_comments() -> Result<(), AppError> {
    let state = create_memory_state();
    let user = create_test_user(1);
    let post = create_test_post(&user, &state).await;
    let comment = create_test_comment(post.post_id, None, &user, &state).await;

    assert_eq!(state.store.count_child_comments(comment.comment_id).await?, 0);
    for _ in 0..3 {
        create_test_comment(post.post_id, Some(comment.comment_id), &user, &state).await;
    }
    assert_eq!(state.store.count_child_comments(comment.comment_id).await?, 3);

    Ok(())
}

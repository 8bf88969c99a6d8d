use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Event emitted after a successful mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    PostDeleted {
        post_id: i64,
        trigger_user_id: i64,
    },
    CommentCreated {
        post_id: i64,
        comment_id: i64,
        parent_id: Option<i64>,
        trigger_user_id: i64,
    },
    CommentDeleted {
        post_id: i64,
        comment_id: i64,
        trigger_user_id: i64,
        is_tombstone: bool,
    },
    PostReacted {
        post_id: i64,
        trigger_user_id: i64,
        points: i32,
    },
    CommentReacted {
        post_id: i64,
        comment_id: i64,
        trigger_user_id: i64,
        points: i32,
    },
}

/// Broadcast channel for [`Notification`], owned by the application state.
///
/// Publishing never fails: when nobody listens, the notification is dropped.
#[derive(Clone, Debug)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, notification: Notification) {
        if let Err(error) = self.sender.send(notification) {
            log::trace!("No subscriber for notification {:?}", error.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

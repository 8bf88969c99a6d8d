use std::sync::Arc;

use crate::notification::NotificationBus;
use crate::store::ContentStore;

/// Application context handed to every operation.
#[derive(Clone)]
pub struct ForumState {
    pub store: Arc<dyn ContentStore>,
    pub notification_bus: NotificationBus,
}

impl ForumState {
    pub fn new(store: Arc<dyn ContentStore>, notification_bus: NotificationBus) -> Self {
        Self {
            store,
            notification_bus,
        }
    }
}

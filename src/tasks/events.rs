use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::data::UserID;

use super::data::TaskID;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Changes were missed; reload everything.
    Resync,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskChange {
    pub user_id: UserID,
    pub task_id: Option<TaskID>,
    pub kind: ChangeKind,
}

impl TaskChange {
    pub fn new(user_id: UserID, task_id: TaskID, kind: ChangeKind) -> TaskChange {
        TaskChange {
            user_id,
            task_id: Some(task_id),
            kind,
        }
    }

    /// Whether a view showing `task_id` has to look at this change.
    pub fn affects(&self, task_id: TaskID) -> bool {
        self.kind == ChangeKind::Resync || self.task_id == Some(task_id)
    }
}

/// In-process change feed for the tasks table.
pub struct TaskEvents {
    sender: broadcast::Sender<TaskChange>,
}

impl TaskEvents {
    pub fn new(capacity: usize) -> TaskEvents {
        let (sender, _) = broadcast::channel(capacity.max(1));
        TaskEvents { sender }
    }

    pub fn publish(&self, change: TaskChange) {
        if self.sender.send(change).is_err() {
            debug!("No task change subscribers");
        }
    }

    pub fn subscribe(&self, user_id: UserID) -> TaskSubscription {
        TaskSubscription {
            user_id,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receives the changes of a single user.
pub struct TaskSubscription {
    user_id: UserID,
    receiver: broadcast::Receiver<TaskChange>,
}

impl TaskSubscription {
    /// `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<TaskChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.user_id == self.user_id => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(user_id = %self.user_id, missed, "Task change subscriber lagged");
                    return Some(TaskChange {
                        user_id: self.user_id,
                        task_id: None,
                        kind: ChangeKind::Resync,
                    });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_only_see_their_own_changes() {
        let events = TaskEvents::new(16);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut feed = events.subscribe(alice);

        let task = Uuid::new_v4();
        events.publish(TaskChange::new(bob, Uuid::new_v4(), ChangeKind::Insert));
        events.publish(TaskChange::new(alice, task, ChangeKind::Update));

        let change = feed.recv().await.unwrap();
        assert_eq!(change, TaskChange::new(alice, task, ChangeKind::Update));
        assert!(change.affects(task));
        assert!(!change.affects(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn lagging_subscribers_are_told_to_resync() {
        let events = TaskEvents::new(2);
        let user = Uuid::new_v4();
        let mut feed = events.subscribe(user);

        for _ in 0..5 {
            events.publish(TaskChange::new(user, Uuid::new_v4(), ChangeKind::Insert));
        }

        let change = feed.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Resync);
        assert!(change.affects(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn feed_ends_when_events_are_dropped() {
        let events = TaskEvents::new(4);
        let mut feed = events.subscribe(Uuid::new_v4());
        drop(events);
        assert!(feed.recv().await.is_none());
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let events = TaskEvents::new(4);
        events.publish(TaskChange::new(Uuid::new_v4(), Uuid::new_v4(), ChangeKind::Delete));
    }
}

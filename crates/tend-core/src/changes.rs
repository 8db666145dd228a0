//! Realtime change notifications for store writes.

use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Tasks,
    Sections,
    Categories,
    DoTodayOff,
    Appointments,
    Habits,
    HabitLogs,
    Goals,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::Sections => "sections",
            Table::Categories => "categories",
            Table::DoTodayOff => "do_today_off_log",
            Table::Appointments => "appointments",
            Table::Habits => "habits",
            Table::HabitLogs => "habit_logs",
            Table::Goals => "goals",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub table: Table,
    pub owner: Uuid,
    pub kind: ChangeKind,
    pub id: Uuid,
    /// Revision of the row after the write (0 for deletes and unversioned tables)
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Change(RowChange),
    /// The subscriber fell behind and must re-fetch everything.
    Lagged,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RowChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: RowChange) {
        tracing::debug!(table = %change.table, id = %change.id, kind = ?change.kind, "row change");
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self, table: Table, owner: Uuid) -> ChangeSubscription {
        ChangeSubscription {
            table,
            owner,
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct ChangeSubscription {
    table: Table,
    owner: Uuid,
    receiver: broadcast::Receiver<RowChange>,
}

impl ChangeSubscription {
    fn matches(&self, change: &RowChange) -> bool {
        change.table == self.table && change.owner == self.owner
    }

    /// Next change for this table and owner; `None` once the feed is dropped.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.matches(&change) => return Some(FeedEvent::Change(change)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return Some(FeedEvent::Lagged),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drains already-delivered changes without waiting.
    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if self.matches(&change) => return Some(FeedEvent::Change(change)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => return Some(FeedEvent::Lagged),
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(table: Table, owner: Uuid) -> RowChange {
        RowChange {
            table,
            owner,
            kind: ChangeKind::Insert,
            id: Uuid::now_v7(),
            revision: 0,
        }
    }

    #[tokio::test]
    async fn test_subscription_filters_by_table_and_owner() {
        let feed = ChangeFeed::default();
        let me = Uuid::now_v7();
        let someone_else = Uuid::now_v7();
        let mut sub = feed.subscribe(Table::Tasks, me);

        feed.publish(change(Table::Tasks, someone_else));
        feed.publish(change(Table::Sections, me));
        let mine = change(Table::Tasks, me);
        feed.publish(mine.clone());

        assert_eq!(sub.recv().await, Some(FeedEvent::Change(mine)));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_lagged_subscriber_is_told_to_resync() {
        let feed = ChangeFeed::new(2);
        let me = Uuid::now_v7();
        let mut sub = feed.subscribe(Table::Tasks, me);

        for _ in 0..5 {
            feed.publish(change(Table::Tasks, me));
        }

        assert_eq!(sub.try_recv(), Some(FeedEvent::Lagged));
    }
}

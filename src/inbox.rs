use crate::error::{AppError, AppResult};
use crate::notification::NotificationRecord;

/// Callback invoked with the full, newest-first record list after every
/// inbox mutation. Runs synchronously on the mutating thread, with the
/// owning engine's locks held; it must not re-enter engine operations.
pub type InboxListener = Box<dyn Fn(&[NotificationRecord]) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Bounded, observable store of fired notifications, newest first.
///
/// Appending beyond the bound evicts the oldest record. Listeners are
/// notified synchronously, in registration order.
pub struct Inbox {
    records: Vec<NotificationRecord>,
    capacity: usize,
    listeners: Vec<(ListenerId, InboxListener)>,
    next_listener_id: u64,
    next_record_id: i64,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self::with_records(capacity, Vec::new())
    }

    /// Rebuild the inbox from persisted history.
    pub fn with_records(capacity: usize, mut records: Vec<NotificationRecord>) -> Self {
        records.truncate(capacity);
        let next_record_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Self {
            records,
            capacity,
            listeners: Vec::new(),
            next_listener_id: 1,
            next_record_id,
        }
    }

    /// Assigns an id, prepends the record, evicts past the bound, and
    /// notifies listeners. Returns the stored record.
    pub fn append(&mut self, mut record: NotificationRecord) -> NotificationRecord {
        record.id = self.next_record_id;
        self.next_record_id += 1;

        self.records.insert(0, record.clone());
        self.records.truncate(self.capacity);
        self.notify_listeners();
        record
    }

    pub fn list(&self) -> Vec<NotificationRecord> {
        self.records.clone()
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn mark_read(&mut self, id: i64) -> AppResult<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(format!("notification {}", id)))?;
        record.read = true;
        self.notify_listeners();
        Ok(())
    }

    pub fn mark_all_read(&mut self) {
        for record in self.records.iter_mut() {
            record.read = true;
        }
        self.notify_listeners();
    }

    pub fn delete(&mut self, id: i64) -> AppResult<()> {
        let len_before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == len_before {
            return Err(AppError::not_found(format!("notification {}", id)));
        }
        self.notify_listeners();
        Ok(())
    }

    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| !r.read).count()
    }

    pub fn subscribe(&mut self, listener: InboxListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns whether a listener was actually removed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let len_before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != len_before
    }

    pub fn clear_subscribers(&mut self) {
        self.listeners.clear();
    }

    /// Replace the record list with the last durable state after a failed
    /// write, notifying listeners of the reverted view.
    pub(crate) fn restore_records(&mut self, records: Vec<NotificationRecord>) {
        self.records = records;
        self.records.truncate(self.capacity);
        self.notify_listeners();
    }

    fn notify_listeners(&self) {
        for (_, listener) in &self.listeners {
            listener(&self.records);
        }
    }
}

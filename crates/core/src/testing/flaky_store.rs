//! Store wrappers that fail on demand.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::inventory::{Event, EventFilter, EventStore, StoreError};
use crate::orders::{Order, OrderError, OrderStore};

/// Delegates to an inner event store, except for the failures it is told to
/// inject.
pub struct FlakyEventStore {
    inner: Arc<dyn EventStore>,
    conflicts_pending: AtomicU32,
    failures_pending: AtomicU32,
    failing_events: Mutex<HashSet<String>>,
    save_calls: AtomicU32,
}

impl FlakyEventStore {
    pub fn new(inner: Arc<dyn EventStore>) -> Self {
        Self {
            inner,
            conflicts_pending: AtomicU32::new(0),
            failures_pending: AtomicU32::new(0),
            failing_events: Mutex::new(HashSet::new()),
            save_calls: AtomicU32::new(0),
        }
    }

    /// The next `n` saves report a version conflict without writing.
    pub fn conflict_next_saves(&self, n: u32) {
        self.conflicts_pending.store(n, Ordering::SeqCst);
    }

    /// The next `n` saves fail with a database error.
    pub fn fail_next_saves(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Every save of this event fails until [`FlakyEventStore::heal`].
    pub fn fail_saves_for(&self, event_id: &str) {
        self.failing_events
            .lock()
            .unwrap()
            .insert(event_id.to_string());
    }

    pub fn heal(&self) {
        self.conflicts_pending.store(0, Ordering::SeqCst);
        self.failures_pending.store(0, Ordering::SeqCst);
        self.failing_events.lock().unwrap().clear();
    }

    /// Saves attempted so far, including injected failures.
    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn take_one(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl EventStore for FlakyEventStore {
    fn create(&self, event: &Event) -> Result<(), StoreError> {
        self.inner.create(event)
    }

    fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
        self.inner.get(id)
    }

    fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        self.inner.list(filter)
    }

    fn list_ids(&self, filter: &EventFilter) -> Result<Vec<String>, StoreError> {
        self.inner.list_ids(filter)
    }

    fn count(&self, filter: &EventFilter) -> Result<i64, StoreError> {
        self.inner.count(filter)
    }

    fn save(&self, event: &Event) -> Result<Event, StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_events.lock().unwrap().contains(&event.id)
            || Self::take_one(&self.failures_pending)
        {
            return Err(StoreError::Database("injected save failure".to_string()));
        }

        if Self::take_one(&self.conflicts_pending) {
            return Err(StoreError::VersionConflict {
                event_id: event.id.clone(),
                expected: event.version,
            });
        }

        self.inner.save(event)
    }
}

/// Delegates to an inner order store; inserts can be made to fail.
pub struct FlakyOrderStore {
    inner: Arc<dyn OrderStore>,
    fail_inserts: AtomicBool,
}

impl FlakyOrderStore {
    pub fn new(inner: Arc<dyn OrderStore>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

impl OrderStore for FlakyOrderStore {
    fn insert(&self, order: &Order) -> Result<(), OrderError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(OrderError::Database("injected insert failure".to_string()));
        }
        self.inner.insert(order)
    }

    fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
        self.inner.get(id)
    }

    fn list_for_event(&self, event_id: &str) -> Result<Vec<Order>, OrderError> {
        self.inner.list_for_event(event_id)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Order>, OrderError> {
        self.inner.find_by_code(code)
    }

    fn mark_ticket_used(
        &self,
        code: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        self.inner.mark_ticket_used(code, event_id, at)
    }
}

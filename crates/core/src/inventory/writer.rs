//! Serialized, version-checked writes of event aggregates.
//!
//! Every write-bearing operation reads the whole event, mutates nested fields
//! and writes it back. Two mechanisms keep those read-modify-write cycles from
//! losing updates:
//!
//! - [`EventLocks`]: one in-process mutex per event id, so writers inside this
//!   process never interleave on the same event.
//! - The store's optimistic `version` check, which catches writers outside
//!   this process. A conflict reloads the event and reapplies the mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::metrics::VERSION_CONFLICTS;

use super::{Event, EventStore, StoreError};

/// Default number of reload-and-retry rounds after a version conflict.
pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 3;

/// Per-event mutexes, created lazily.
#[derive(Default)]
pub struct EventLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, event_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(
            locks
                .entry(event_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Number of events that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The single write path for event aggregates.
#[derive(Clone)]
pub struct EventWriter {
    store: Arc<dyn EventStore>,
    locks: Arc<EventLocks>,
    max_retries: u32,
}

impl EventWriter {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            locks: Arc::new(EventLocks::new()),
            max_retries: DEFAULT_MAX_WRITE_RETRIES,
        }
    }

    /// Share a lock table with other writers (writers on the same process
    /// must share one, or they do not serialize against each other).
    pub fn with_locks(mut self, locks: Arc<EventLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<EventLocks> {
        &self.locks
    }

    /// Run `f` while holding the event's lock.
    ///
    /// Must not be nested for the same event id: the lock is not reentrant.
    pub fn exclusive<T>(&self, event_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.lock_for(event_id);
        let _guard = lock.lock().unwrap();
        f()
    }

    /// Load, mutate and save one event under its lock.
    ///
    /// `apply` is called again on a freshly loaded copy after each version
    /// conflict, so it must derive everything from the event it is given.
    pub fn mutate<T, E, F>(&self, event_id: &str, apply: F) -> Result<(Event, T), E>
    where
        F: FnMut(&mut Event) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.exclusive(event_id, || self.mutate_held(event_id, apply))
    }

    /// Like [`EventWriter::mutate`], for callers already inside
    /// [`EventWriter::exclusive`] for this event.
    pub fn mutate_held<T, E, F>(&self, event_id: &str, mut apply: F) -> Result<(Event, T), E>
    where
        F: FnMut(&mut Event) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conflicts = 0;
        loop {
            let mut event = self.load(event_id)?;
            let outcome = apply(&mut event)?;
            if let Some(saved) = self.save_or_retry(&event, &mut conflicts)? {
                return Ok((saved, outcome));
            }
        }
    }

    /// Like [`EventWriter::mutate`], but `apply` may return `None` to say
    /// nothing changed, in which case nothing is written.
    pub fn mutate_if_changed<T, E, F>(
        &self,
        event_id: &str,
        mut apply: F,
    ) -> Result<Option<(Event, T)>, E>
    where
        F: FnMut(&mut Event) -> Result<Option<T>, E>,
        E: From<StoreError>,
    {
        self.exclusive(event_id, || {
            let mut conflicts = 0;
            loop {
                let mut event = self.load(event_id)?;
                let outcome = match apply(&mut event)? {
                    Some(outcome) => outcome,
                    None => return Ok(None),
                };
                if let Some(saved) = self.save_or_retry(&event, &mut conflicts)? {
                    return Ok(Some((saved, outcome)));
                }
            }
        })
    }

    fn load(&self, event_id: &str) -> Result<Event, StoreError> {
        self.store
            .get(event_id)?
            .ok_or_else(|| StoreError::NotFound(event_id.to_string()))
    }

    /// `Ok(None)` means the save lost a version race and the caller should
    /// reload and reapply.
    fn save_or_retry(
        &self,
        event: &Event,
        conflicts: &mut u32,
    ) -> Result<Option<Event>, StoreError> {
        match self.store.save(event) {
            Ok(saved) => Ok(Some(saved)),
            Err(StoreError::VersionConflict { expected, .. }) if *conflicts < self.max_retries => {
                *conflicts += 1;
                VERSION_CONFLICTS.inc();
                warn!(
                    "Version conflict on event {} (expected {}), retry {}/{}",
                    event.id, expected, conflicts, self.max_retries
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::SqliteEventStore;
    use crate::testing::{fixtures, FlakyEventStore};

    fn writer_with(event: Event) -> (EventWriter, Arc<SqliteEventStore>) {
        let store = Arc::new(SqliteEventStore::in_memory().unwrap());
        store.create(&event).unwrap();
        let writer = EventWriter::new(Arc::clone(&store) as Arc<dyn EventStore>);
        (writer, store)
    }

    #[test]
    fn test_mutate_persists_change() {
        let (writer, store) = writer_with(fixtures::tier_event("evt-1", 5));

        let (saved, previous) = writer
            .mutate::<_, StoreError, _>("evt-1", |event| {
                let previous = event.tiers[0].remaining;
                event.tiers[0].remaining -= 1;
                event.sold += 1;
                Ok(previous)
            })
            .unwrap();

        assert_eq!(previous, 5);
        assert_eq!(saved.version, 1);
        assert_eq!(store.get("evt-1").unwrap().unwrap().tiers[0].remaining, 4);
    }

    #[test]
    fn test_mutate_missing_event() {
        let (writer, _store) = writer_with(fixtures::tier_event("evt-1", 5));
        let result = writer.mutate::<(), StoreError, _>("nope", |_| Ok(()));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_mutate_does_not_save_when_apply_fails() {
        let (writer, store) = writer_with(fixtures::tier_event("evt-1", 5));

        let result = writer.mutate::<(), StoreError, _>("evt-1", |event| {
            event.tiers[0].remaining = 0;
            Err(StoreError::Database("rejected".to_string()))
        });

        assert!(result.is_err());
        let stored = store.get("evt-1").unwrap().unwrap();
        assert_eq!(stored.tiers[0].remaining, 5);
        assert_eq!(stored.version, 0);
    }

    #[test]
    fn test_mutate_retries_after_version_conflict() {
        let inner = Arc::new(SqliteEventStore::in_memory().unwrap());
        inner.create(&fixtures::tier_event("evt-1", 5)).unwrap();
        let flaky = Arc::new(FlakyEventStore::new(Arc::clone(&inner) as Arc<dyn EventStore>));
        flaky.conflict_next_saves(2);

        let writer = EventWriter::new(Arc::clone(&flaky) as Arc<dyn EventStore>);
        let mut attempts = 0;
        let (saved, _) = writer
            .mutate::<_, StoreError, _>("evt-1", |event| {
                attempts += 1;
                event.tiers[0].remaining -= 1;
                event.sold += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(saved.tiers[0].remaining, 4);
    }

    #[test]
    fn test_mutate_gives_up_after_max_retries() {
        let inner = Arc::new(SqliteEventStore::in_memory().unwrap());
        inner.create(&fixtures::tier_event("evt-1", 5)).unwrap();
        let flaky = Arc::new(FlakyEventStore::new(Arc::clone(&inner) as Arc<dyn EventStore>));
        flaky.conflict_next_saves(10);

        let writer =
            EventWriter::new(Arc::clone(&flaky) as Arc<dyn EventStore>).with_max_retries(1);
        let result = writer.mutate::<(), StoreError, _>("evt-1", |_| Ok(()));

        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
    }

    #[test]
    fn test_mutate_if_changed_skips_write() {
        let (writer, store) = writer_with(fixtures::tier_event("evt-1", 5));

        let skipped = writer
            .mutate_if_changed::<(), StoreError, _>("evt-1", |_| Ok(None))
            .unwrap();
        assert!(skipped.is_none());
        assert_eq!(store.get("evt-1").unwrap().unwrap().version, 0);

        let written = writer
            .mutate_if_changed::<_, StoreError, _>("evt-1", |event| {
                event.description = "changed".to_string();
                Ok(Some(()))
            })
            .unwrap();
        assert_eq!(written.unwrap().0.version, 1);
    }

    #[test]
    fn test_locks_are_shared_per_event() {
        let locks = EventLocks::new();
        let a = locks.lock_for("evt-1");
        let b = locks.lock_for("evt-1");
        let c = locks.lock_for("evt-2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }
}

//! SQLite-backed event store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{Event, EventFilter, EventStore, StoreError};

/// SQLite-backed event store.
///
/// Each event is a single JSON document; `status`, `date`, `seller_id` and
/// `version` are denormalized into columns for filtering and optimistic
/// concurrency.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Create a new SQLite event store, creating the database file and tables if needed.
    ///
    /// Several stores may open the same file; they then wait on each other's
    /// write locks for up to five seconds.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite event store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                seller_id TEXT,
                version INTEGER NOT NULL DEFAULT 0,
                document TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
            CREATE INDEX IF NOT EXISTS idx_events_status ON events(status);
            CREATE INDEX IF NOT EXISTS idx_events_seller_id ON events(seller_id);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &EventFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        if let Some(ref seller_id) = filter.seller_id {
            conditions.push("seller_id = ?");
            params.push(Box::new(seller_id.clone()));
        }

        if filter.exclude_sticky {
            conditions.push("status NOT IN ('cancelado', 'liquidado')");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn decode(document: &str, version: i64) -> Result<Event, StoreError> {
        let mut event: Event =
            serde_json::from_str(document).map_err(|e| StoreError::Serialization(e.to_string()))?;
        event.version = version;
        Ok(event)
    }

    fn encode(event: &Event) -> Result<String, StoreError> {
        serde_json::to_string(event).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl EventStore for SqliteEventStore {
    fn create(&self, event: &Event) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let document = Self::encode(event)?;

        let result = conn.execute(
            "INSERT INTO events (id, name, date, status, seller_id, version, document, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                event.id,
                event.name,
                event.date.to_string(),
                event.status.as_str(),
                event.seller_id,
                event.version,
                document,
                event.created_at.to_rfc3339(),
                event.updated_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists(event.id.clone()))
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT document, version FROM events WHERE id = ?",
            params![id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok((document, version)) => Self::decode(&document, version).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT document, version FROM events {} ORDER BY date ASC, created_at ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut events = Vec::new();
        for row_result in rows {
            let (document, version) =
                row_result.map_err(|e| StoreError::Database(e.to_string()))?;
            events.push(Self::decode(&document, version)?);
        }

        Ok(events)
    }

    fn list_ids(&self, filter: &EventFilter) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id FROM events {} ORDER BY date ASC, created_at ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();

        let ids = stmt
            .query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(ids)
    }

    fn count(&self, filter: &EventFilter) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM events {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn save(&self, event: &Event) -> Result<Event, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut saved = event.clone();
        saved.version = event.version + 1;
        saved.updated_at = Utc::now();
        let document = Self::encode(&saved)?;

        let changed = conn
            .execute(
                "UPDATE events SET name = ?, date = ?, status = ?, seller_id = ?, version = ?, document = ?, updated_at = ? WHERE id = ? AND version = ?",
                params![
                    saved.name,
                    saved.date.to_string(),
                    saved.status.as_str(),
                    saved.seller_id,
                    saved.version,
                    document,
                    saved.updated_at.to_rfc3339(),
                    event.id,
                    event.version,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?)",
                    params![event.id],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;

            return Err(if exists {
                StoreError::VersionConflict {
                    event_id: event.id.clone(),
                    expected: event.version,
                }
            } else {
                StoreError::NotFound(event.id.clone())
            });
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::EventStatus;
    use crate::testing::fixtures;

    fn create_test_store() -> SqliteEventStore {
        SqliteEventStore::in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_event() {
        let store = create_test_store();
        let event = fixtures::seated_event("evt-1", 2, 3);

        store.create(&event).unwrap();
        let fetched = store.get("evt-1").unwrap().unwrap();

        assert_eq!(fetched.name, event.name);
        assert_eq!(fetched.sectors.len(), 1);
        assert_eq!(fetched.sectors[0].rows.len(), 2);
        assert_eq!(fetched.seats().count(), 6);
        assert_eq!(fetched.version, 0);
    }

    #[test]
    fn test_get_nonexistent_event() {
        let store = create_test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let store = create_test_store();
        let event = fixtures::tier_event("evt-1", 10);
        store.create(&event).unwrap();

        let result = store.create(&event);
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn test_save_bumps_version() {
        let store = create_test_store();
        let mut event = fixtures::tier_event("evt-1", 10);
        store.create(&event).unwrap();

        event.tiers[0].remaining = 9;
        event.sold = 1;
        let saved = store.save(&event).unwrap();
        assert_eq!(saved.version, 1);

        let fetched = store.get("evt-1").unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.tiers[0].remaining, 9);
    }

    #[test]
    fn test_save_with_stale_version_conflicts() {
        let store = create_test_store();
        let event = fixtures::tier_event("evt-1", 10);
        store.create(&event).unwrap();

        let first = event.clone();
        let second = event.clone();

        store.save(&first).unwrap();
        let result = store.save(&second);

        assert!(matches!(
            result,
            Err(StoreError::VersionConflict { expected: 0, .. })
        ));
    }

    #[test]
    fn test_save_missing_event() {
        let store = create_test_store();
        let event = fixtures::tier_event("ghost", 10);
        assert!(matches!(store.save(&event), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_filters_by_status() {
        let store = create_test_store();

        let upcoming = fixtures::tier_event("evt-1", 10);
        let mut cancelled = fixtures::tier_event("evt-2", 10);
        cancelled.status = EventStatus::Cancelado;
        let mut settled = fixtures::tier_event("evt-3", 10);
        settled.status = EventStatus::Liquidado;

        store.create(&upcoming).unwrap();
        store.create(&cancelled).unwrap();
        store.create(&settled).unwrap();

        let all = store.list(&EventFilter::new()).unwrap();
        assert_eq!(all.len(), 3);

        let active = store.list(&EventFilter::all().excluding_sticky()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "evt-1");

        let cancelled_only = store
            .list(&EventFilter::new().with_status(EventStatus::Cancelado))
            .unwrap();
        assert_eq!(cancelled_only.len(), 1);
        assert_eq!(store.count(&EventFilter::new()).unwrap(), 3);
    }

    #[test]
    fn test_list_ids_skips_decoding() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("events.db");
        let store = SqliteEventStore::new(&db_path).unwrap();

        store.create(&fixtures::tier_event("evt-1", 5)).unwrap();
        let mut cancelled = fixtures::tier_event("evt-2", 5);
        cancelled.status = EventStatus::Cancelado;
        store.create(&cancelled).unwrap();
        store.create(&fixtures::tier_event("evt-3", 5)).unwrap();

        Connection::open(&db_path)
            .unwrap()
            .execute("UPDATE events SET document = '{bad' WHERE id = 'evt-1'", [])
            .unwrap();

        assert!(matches!(
            store.list(&EventFilter::all()),
            Err(StoreError::Serialization(_))
        ));
        let mut ids = store.list_ids(&EventFilter::all().excluding_sticky()).unwrap();
        ids.sort();
        assert_eq!(ids, vec!["evt-1".to_string(), "evt-3".to_string()]);
    }

    #[test]
    fn test_list_pagination() {
        let store = create_test_store();
        for i in 0..5 {
            store
                .create(&fixtures::tier_event(&format!("evt-{}", i), 5))
                .unwrap();
        }

        let page = store
            .list(&EventFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("events.db");

        let store = SqliteEventStore::new(&db_path).unwrap();
        store.create(&fixtures::tier_event("evt-1", 5)).unwrap();

        assert!(db_path.exists());
        assert!(store.get("evt-1").unwrap().is_some());
    }
}

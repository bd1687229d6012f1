//! SQLite-backed order store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Order, OrderError, OrderStore};

/// SQLite-backed order store.
///
/// Orders are JSON documents; `ticket_codes` maps every verifier code to its
/// order and enforces code uniqueness.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    pub fn new(path: &Path) -> Result<Self, OrderError> {
        let conn = Connection::open(path).map_err(|e| OrderError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| OrderError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, OrderError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OrderError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                document TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_event_id ON orders(event_id);

            CREATE TABLE IF NOT EXISTS ticket_codes (
                code TEXT PRIMARY KEY,
                order_id TEXT NOT NULL REFERENCES orders(id),
                event_id TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| OrderError::Database(e.to_string()))
    }

    fn decode(document: &str) -> Result<Order, OrderError> {
        serde_json::from_str(document).map_err(|e| OrderError::Serialization(e.to_string()))
    }

    fn encode(order: &Order) -> Result<String, OrderError> {
        serde_json::to_string(order).map_err(|e| OrderError::Serialization(e.to_string()))
    }

    fn order_id_for_code(conn: &Connection, code: &str) -> Result<Option<String>, OrderError> {
        conn.query_row(
            "SELECT order_id FROM ticket_codes WHERE code = ?",
            params![code],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| OrderError::Database(e.to_string()))
    }

    fn load(conn: &Connection, id: &str) -> Result<Option<Order>, OrderError> {
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM orders WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| OrderError::Database(e.to_string()))?;

        document.as_deref().map(Self::decode).transpose()
    }
}

impl OrderStore for SqliteOrderStore {
    fn insert(&self, order: &Order) -> Result<(), OrderError> {
        let mut conn = self.conn.lock().unwrap();
        let document = Self::encode(order)?;

        let tx = conn
            .transaction()
            .map_err(|e| OrderError::Database(e.to_string()))?;

        match tx.execute(
            "INSERT INTO orders (id, event_id, document, created_at) VALUES (?, ?, ?, ?)",
            params![
                order.id,
                order.event.id,
                document,
                order.created_at.to_rfc3339()
            ],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(OrderError::AlreadyExists(order.id.clone()));
            }
            Err(e) => return Err(OrderError::Database(e.to_string())),
        }

        for ticket in &order.tickets {
            match tx.execute(
                "INSERT INTO ticket_codes (code, order_id, event_id) VALUES (?, ?, ?)",
                params![ticket.verifier_code, order.id, order.event.id],
            ) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(OrderError::DuplicateCode(ticket.verifier_code.clone()));
                }
                Err(e) => return Err(OrderError::Database(e.to_string())),
            }
        }

        tx.commit().map_err(|e| OrderError::Database(e.to_string()))
    }

    fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();
        Self::load(&conn, id)
    }

    fn list_for_event(&self, event_id: &str) -> Result<Vec<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT document FROM orders WHERE event_id = ? ORDER BY created_at ASC")
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![event_id], |row| row.get::<_, String>(0))
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let mut orders = Vec::new();
        for row_result in rows {
            let document = row_result.map_err(|e| OrderError::Database(e.to_string()))?;
            orders.push(Self::decode(&document)?);
        }

        Ok(orders)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();
        match Self::order_id_for_code(&conn, code)? {
            Some(order_id) => Self::load(&conn, &order_id),
            None => Ok(None),
        }
    }

    fn mark_ticket_used(
        &self,
        code: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        // The connection lock is held for the whole check-and-set.
        let conn = self.conn.lock().unwrap();

        let order_id = Self::order_id_for_code(&conn, code)?
            .ok_or_else(|| OrderError::TicketNotFound(code.to_string()))?;
        let mut order =
            Self::load(&conn, &order_id)?.ok_or_else(|| OrderError::NotFound(order_id.clone()))?;

        if order.event.id != event_id {
            return Err(OrderError::EventMismatch {
                code: code.to_string(),
                expected: event_id.to_string(),
                actual: order.event.id.clone(),
            });
        }

        let ticket = order
            .ticket_by_code_mut(code)
            .ok_or_else(|| OrderError::TicketNotFound(code.to_string()))?;

        if ticket.used {
            return Err(OrderError::AlreadyUsed {
                code: code.to_string(),
                used_at: ticket.used_at.unwrap_or(order.created_at),
            });
        }

        ticket.used = true;
        ticket.used_at = Some(at);

        let document = Self::encode(&order)?;
        conn.execute(
            "UPDATE orders SET document = ? WHERE id = ?",
            params![document, order.id],
        )
        .map_err(|e| OrderError::Database(e.to_string()))?;

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{EventSnapshot, OrderStatus, Ticket};
    use crate::testing::fixtures;

    fn ticket(code: &str) -> Ticket {
        Ticket {
            id: format!("tkt-{}", code),
            tier_id: "general".to_string(),
            tier_label: "General".to_string(),
            amount_cents: 2500,
            verifier_code: code.to_string(),
            holder_name: "Ana Torres".to_string(),
            holder_email: "ana@example.com".to_string(),
            seat: None,
            sector_label: None,
            row_label: None,
            seat_label: None,
            used: false,
            used_at: None,
        }
    }

    fn order(id: &str, event_id: &str, codes: &[&str]) -> Order {
        let event = fixtures::tier_event(event_id, 10);
        Order {
            id: id.to_string(),
            buyer: fixtures::buyer(),
            event: EventSnapshot::from(&event),
            tickets: codes.iter().map(|c| ticket(c)).collect(),
            total_cents: 2500 * codes.len() as u64,
            payment_method: "card".to_string(),
            status: OrderStatus::Pending,
            created_at: fixtures::fixture_instant(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.insert(&order("ord-1", "evt-1", &["AAAA", "BBBB"])).unwrap();

        let fetched = store.get("ord-1").unwrap().unwrap();
        assert_eq!(fetched.tickets.len(), 2);
        assert_eq!(fetched.status, OrderStatus::Pending);
        assert!(store.get("ord-2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_code_rejects_whole_order() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.insert(&order("ord-1", "evt-1", &["AAAA"])).unwrap();

        let result = store.insert(&order("ord-2", "evt-1", &["CCCC", "AAAA"]));
        assert!(matches!(result, Err(OrderError::DuplicateCode(code)) if code == "AAAA"));

        assert!(store.get("ord-2").unwrap().is_none());
        assert!(store.find_by_code("CCCC").unwrap().is_none());
    }

    #[test]
    fn test_list_for_event() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.insert(&order("ord-1", "evt-1", &["AAAA"])).unwrap();
        store.insert(&order("ord-2", "evt-2", &["BBBB"])).unwrap();
        store.insert(&order("ord-3", "evt-1", &["CCCC"])).unwrap();

        let orders = store.list_for_event("evt-1").unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"ord-1"));
        assert!(ids.contains(&"ord-3"));
    }

    #[test]
    fn test_find_by_code() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.insert(&order("ord-1", "evt-1", &["AAAA", "BBBB"])).unwrap();

        let found = store.find_by_code("BBBB").unwrap().unwrap();
        assert_eq!(found.id, "ord-1");
        assert!(store.find_by_code("ZZZZ").unwrap().is_none());
    }

    #[test]
    fn test_mark_ticket_used_once() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.insert(&order("ord-1", "evt-1", &["AAAA", "BBBB"])).unwrap();
        let at = fixtures::fixture_instant();

        let updated = store.mark_ticket_used("AAAA", "evt-1", at).unwrap();
        assert!(updated.ticket_by_code("AAAA").unwrap().used);
        assert!(!updated.ticket_by_code("BBBB").unwrap().used);

        let second = store.mark_ticket_used("AAAA", "evt-1", at);
        assert!(matches!(second, Err(OrderError::AlreadyUsed { .. })));

        let stored = store.get("ord-1").unwrap().unwrap();
        assert_eq!(stored.used_count(), 1);
        assert_eq!(stored.ticket_by_code("AAAA").unwrap().used_at, Some(at));
    }

    #[test]
    fn test_mark_ticket_used_wrong_event() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.insert(&order("ord-1", "evt-1", &["AAAA"])).unwrap();

        let result = store.mark_ticket_used("AAAA", "evt-2", fixtures::fixture_instant());
        assert!(matches!(result, Err(OrderError::EventMismatch { .. })));
        assert_eq!(store.get("ord-1").unwrap().unwrap().used_count(), 0);
    }

    #[test]
    fn test_mark_unknown_ticket() {
        let store = SqliteOrderStore::in_memory().unwrap();
        let result = store.mark_ticket_used("NOPE", "evt-1", fixtures::fixture_instant());
        assert!(matches!(result, Err(OrderError::TicketNotFound(_))));
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("orders.db");

        {
            let store = SqliteOrderStore::new(&db_path).unwrap();
            store.insert(&order("ord-1", "evt-1", &["AAAA"])).unwrap();
        }

        let reopened = SqliteOrderStore::new(&db_path).unwrap();
        assert!(reopened.get("ord-1").unwrap().is_some());
    }
}

//! Concurrent writers on one event never lose updates or oversell.

use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use boletera_core::{
    testing::{fixtures, ManualClock},
    CheckoutError, CheckoutRequest, CheckoutService, Clock, ErrorKind, EventLocks, EventStore,
    EventWriter, LedgerConfig, LedgerError, OrderStore, ReservationLedger, SeatRef,
    SqliteEventStore, SqliteOrderStore, TicketRequest,
};

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(fixtures::fixture_instant()))
}

fn one_ticket(event_id: &str, holder: &str) -> CheckoutRequest {
    CheckoutRequest {
        event_id: event_id.to_string(),
        holder_id: holder.to_string(),
        buyer: fixtures::buyer(),
        payment_method: "card".to_string(),
        tickets: vec![TicketRequest::tier("general")],
    }
}

/// Scenario A: two simultaneous commits for the last unit.
#[test]
fn test_last_unit_is_sold_once() {
    for _ in 0..20 {
        let events = Arc::new(SqliteEventStore::in_memory().unwrap());
        events.create(&fixtures::tier_event("evt-1", 1)).unwrap();
        let orders: Arc<dyn OrderStore> = Arc::new(SqliteOrderStore::in_memory().unwrap());
        let checkout = Arc::new(CheckoutService::new(
            EventWriter::new(Arc::clone(&events) as Arc<dyn EventStore>),
            Arc::clone(&orders),
            clock(),
            None,
        ));

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["ana", "luis"]
            .into_iter()
            .map(|holder| {
                let checkout = Arc::clone(&checkout);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    checkout.commit(&one_ticket("evt-1", holder))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let sold = results.iter().filter(|r| r.is_ok()).count();
        let sold_out = results
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::SoldOut(_))))
            .count();
        assert_eq!((sold, sold_out), (1, 1));

        let event = events.get("evt-1").unwrap().unwrap();
        assert_eq!(event.tier_remaining("general"), Some(0));
        assert_eq!(event.sold, 1);
        assert_eq!(orders.list_for_event("evt-1").unwrap().len(), 1);
    }
}

#[test]
fn test_racing_holds_on_one_seat() {
    let events = Arc::new(SqliteEventStore::in_memory().unwrap());
    events.create(&fixtures::seated_event("evt-1", 1, 1)).unwrap();
    let ledger = Arc::new(ReservationLedger::new(
        EventWriter::new(Arc::clone(&events) as Arc<dyn EventStore>),
        clock(),
        LedgerConfig::default(),
        None,
    ));
    let seat = SeatRef::new("sec-a", "row-1", "s1-1");

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let seat = seat.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger.place_hold("evt-1", &seat, &format!("buyer-{}", i), None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::AlreadyReserved(_))));

    let event = events.get("evt-1").unwrap().unwrap();
    let stored = &event.locate(&seat).unwrap().seat;
    assert_eq!(stored.reserved_by.as_deref(), Some(winners[0].holder_id.as_str()));
}

/// Writers that do not share a lock table, like two processes on one
/// database, still lose no holds thanks to the version check.
#[test]
fn test_unshared_writers_keep_every_hold() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("events.db");

    let seeded = SqliteEventStore::new(&db_path).unwrap();
    seeded.create(&fixtures::seated_event("evt-1", 2, 5)).unwrap();

    let ledgers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::new(SqliteEventStore::new(&db_path).unwrap()) as Arc<dyn EventStore>;
            let writer = EventWriter::new(store)
                .with_locks(Arc::new(EventLocks::new()))
                .with_max_retries(100);
            Arc::new(ReservationLedger::new(
                writer,
                clock(),
                LedgerConfig::default(),
                None,
            ))
        })
        .collect();

    let seats: Vec<_> = (1..=2)
        .flat_map(|r| {
            (1..=5).map(move |n| {
                SeatRef::new("sec-a", format!("row-{}", r), format!("s{}-{}", r, n))
            })
        })
        .collect();

    let barrier = Arc::new(Barrier::new(seats.len()));
    let handles: Vec<_> = seats
        .iter()
        .enumerate()
        .map(|(i, seat)| {
            let ledger = Arc::clone(&ledgers[i % 2]);
            let barrier = Arc::clone(&barrier);
            let seat = seat.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger.place_hold("evt-1", &seat, &format!("buyer-{}", i), None)
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        if let Err(e) = &result {
            // Only an exhausted retry budget may fail, and it must say so.
            assert_eq!(e.kind(), ErrorKind::Conflict, "{}", e);
        }
    }

    let event = seeded.get("evt-1").unwrap().unwrap();
    let held = event.seats().filter(|s| s.reserved).count() as i64;
    // Every successful hold is one saved version; none was overwritten.
    assert_eq!(held, event.version);
    assert!(event.invariant_violations().is_empty());
}

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{record, AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::inventory::{Event, EventStatus, EventWriter, SeatRef, StoreError};
use crate::metrics::{COMMIT_REJECTIONS, ORDERS_COMMITTED, TICKETS_SOLD};
use crate::orders::{
    generate_verifier_code, EventSnapshot, Order, OrderError, OrderStatus, OrderStore, Ticket,
};

use super::{CheckoutError, CheckoutRequest, TicketRequest};

/// What one ticket took from the event, enough to issue it and to put it back.
#[derive(Debug, Clone)]
struct SoldLine {
    tier_id: String,
    tier_label: String,
    price_cents: u64,
    seat: Option<SoldSeat>,
}

#[derive(Debug, Clone)]
struct SoldSeat {
    seat: SeatRef,
    sector_label: String,
    row_label: String,
    seat_label: String,
    /// Expiry of the hold that was converted.
    held_until: Option<DateTime<Utc>>,
}

/// The commit path: the only writer of tier counts and seat occupancy.
pub struct CheckoutService {
    writer: EventWriter,
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditHandle>,
}

fn rejected(e: CheckoutError) -> CheckoutError {
    COMMIT_REJECTIONS.with_label_values(&[e.reason()]).inc();
    debug!("Checkout rejected: {}", e);
    e
}

impl CheckoutService {
    pub fn new(
        writer: EventWriter,
        orders: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            writer,
            orders,
            clock,
            audit,
        }
    }

    /// Sell every requested ticket or none of them.
    ///
    /// Runs under the event's lock from the first read to the order write,
    /// so two commits on the same event never both see the last unit.
    pub fn commit(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        validate_request(request).map_err(rejected)?;

        self.writer
            .exclusive(&request.event_id, || self.commit_held(request))
            .map_err(rejected)
    }

    pub fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
        self.orders.get(order_id)
    }

    pub fn orders_for_event(&self, event_id: &str) -> Result<Vec<Order>, OrderError> {
        self.orders.list_for_event(event_id)
    }

    fn commit_held(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        let now = self.clock.now();
        let (saved, lines) = self.writer.mutate_held(&request.event_id, |event| {
            take_stock(event, request, now)
        })?;

        let order = build_order(&saved, request, &lines, now);
        if let Err(e) = self.orders.insert(&order) {
            warn!(
                "Order write failed for event {}, restoring inventory: {}",
                request.event_id, e
            );
            self.compensate(request, &lines, &e);
            return Err(CheckoutError::OrderWrite(e));
        }

        ORDERS_COMMITTED.inc();
        TICKETS_SOLD.inc_by(order.tickets.len() as u64);
        info!(
            "Order {} committed on event {}: {} tickets, {} cents",
            order.id,
            request.event_id,
            order.tickets.len(),
            order.total_cents
        );
        record(
            &self.audit,
            AuditEvent::OrderCommitted {
                event_id: request.event_id.clone(),
                order_id: order.id.clone(),
                holder_id: request.holder_id.clone(),
                tickets: order.tickets.len() as u32,
                total_cents: order.total_cents,
                seats: order
                    .tickets
                    .iter()
                    .filter_map(|t| t.seat.as_ref().map(SeatRef::to_string))
                    .collect(),
            },
        );

        Ok(order)
    }

    /// Undo `take_stock` after a failed order write. Caller holds the lock.
    fn compensate(&self, request: &CheckoutRequest, lines: &[SoldLine], cause: &OrderError) {
        let restored = self
            .writer
            .mutate_held::<_, StoreError, _>(&request.event_id, |event| {
                put_back(event, &request.holder_id, lines);
                Ok(())
            });

        let reason = match restored {
            Ok(_) => cause.to_string(),
            Err(e) => {
                error!(
                    "Failed to restore inventory of event {} after order failure: {}",
                    request.event_id, e
                );
                format!("{}; restore failed: {}", cause, e)
            }
        };
        record(
            &self.audit,
            AuditEvent::CommitCompensated {
                event_id: request.event_id.clone(),
                holder_id: request.holder_id.clone(),
                reason,
            },
        );
    }
}

fn validate_request(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    if request.tickets.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }
    if request.holder_id.trim().is_empty() {
        return Err(CheckoutError::Invalid("holder id is empty".to_string()));
    }
    if request.buyer.name.trim().is_empty() || request.buyer.email.trim().is_empty() {
        return Err(CheckoutError::Invalid(
            "buyer name and email are required".to_string(),
        ));
    }
    Ok(())
}

/// Decrement tiers and occupy seats on the loaded event. Nothing is applied
/// to the stored copy unless every ticket passes.
fn take_stock(
    event: &mut Event,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<Vec<SoldLine>, CheckoutError> {
    if event.status.is_sticky() || event.status == EventStatus::Finalizado {
        return Err(CheckoutError::EventClosed(event.status));
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(request.tickets.len());

    for ticket in &request.tickets {
        let line = take_one(event, ticket, &request.holder_id, now, &mut seen)?;
        lines.push(line);
    }

    Ok(lines)
}

fn take_one(
    event: &mut Event,
    ticket: &TicketRequest,
    holder_id: &str,
    now: DateTime<Utc>,
    seen: &mut HashSet<SeatRef>,
) -> Result<SoldLine, CheckoutError> {
    let tier = event
        .tier(&ticket.tier_id)
        .ok_or_else(|| CheckoutError::TierNotFound(ticket.tier_id.clone()))?;
    let tier_sector = tier.sector_id.clone();

    let seat = match (&ticket.seat, event.is_seated()) {
        (Some(_), false) => return Err(CheckoutError::SeatOnTierEvent),
        (None, true) => return Err(CheckoutError::SeatRequired(ticket.tier_id.clone())),
        (None, false) => None,
        (Some(seat_ref), true) => {
            if !seen.insert(seat_ref.clone()) {
                return Err(CheckoutError::DuplicateSeat(seat_ref.clone()));
            }
            if tier_sector.as_deref().is_some_and(|s| s != seat_ref.sector_id) {
                return Err(CheckoutError::SeatOutsideTier {
                    seat: seat_ref.clone(),
                    tier_id: ticket.tier_id.clone(),
                });
            }
            let located = event
                .locate(seat_ref)
                .ok_or_else(|| CheckoutError::SeatNotFound(seat_ref.clone()))?;
            if located.seat.occupied {
                return Err(CheckoutError::SeatOccupied(seat_ref.clone()));
            }
            if !located.is_available() {
                return Err(CheckoutError::SeatUnavailable(seat_ref.clone()));
            }
            if !(located.seat.is_held_by(holder_id) && located.seat.has_live_hold(now)) {
                return Err(CheckoutError::SeatNotHeld(seat_ref.clone()));
            }
            Some(SoldSeat {
                seat: seat_ref.clone(),
                sector_label: located.sector.label.clone(),
                row_label: located.row.label.clone(),
                seat_label: located.seat.label.clone(),
                held_until: located.seat.reservation_expiry,
            })
        }
    };

    let tier = event
        .tier_mut(&ticket.tier_id)
        .ok_or_else(|| CheckoutError::TierNotFound(ticket.tier_id.clone()))?;
    if tier.remaining == 0 {
        return Err(CheckoutError::SoldOut(ticket.tier_id.clone()));
    }
    tier.remaining -= 1;
    let line = SoldLine {
        tier_id: tier.id.clone(),
        tier_label: tier.label.clone(),
        price_cents: tier.price_cents,
        seat,
    };
    event.sold += 1;

    if let Some(sold) = &line.seat {
        if let Some(target) = event.seat_mut(&sold.seat) {
            target.occupy();
        }
    }

    Ok(line)
}

/// Inverse of `take_stock`: give the units back and restore the holds.
fn put_back(event: &mut Event, holder_id: &str, lines: &[SoldLine]) {
    for line in lines {
        if let Some(tier) = event.tier_mut(&line.tier_id) {
            tier.remaining = (tier.remaining + 1).min(tier.capacity);
        }
        event.sold = event.sold.saturating_sub(1);

        if let Some(sold) = &line.seat {
            if let Some(seat) = event.seat_mut(&sold.seat) {
                seat.occupied = false;
                if let Some(expiry) = sold.held_until {
                    seat.place_hold(holder_id, expiry);
                }
            }
        }
    }
}

fn build_order(
    event: &Event,
    request: &CheckoutRequest,
    lines: &[SoldLine],
    now: DateTime<Utc>,
) -> Order {
    let tickets: Vec<Ticket> = request
        .tickets
        .iter()
        .zip(lines)
        .map(|(asked, line)| Ticket {
            id: Uuid::new_v4().to_string(),
            tier_id: line.tier_id.clone(),
            tier_label: line.tier_label.clone(),
            amount_cents: line.price_cents,
            verifier_code: generate_verifier_code(),
            holder_name: asked
                .attendee_name
                .clone()
                .unwrap_or_else(|| request.buyer.name.clone()),
            holder_email: asked
                .attendee_email
                .clone()
                .unwrap_or_else(|| request.buyer.email.clone()),
            seat: line.seat.as_ref().map(|s| s.seat.clone()),
            sector_label: line.seat.as_ref().map(|s| s.sector_label.clone()),
            row_label: line.seat.as_ref().map(|s| s.row_label.clone()),
            seat_label: line.seat.as_ref().map(|s| s.seat_label.clone()),
            used: false,
            used_at: None,
        })
        .collect();

    Order {
        id: Uuid::new_v4().to_string(),
        buyer: request.buyer.clone(),
        event: EventSnapshot::from(event),
        total_cents: tickets.iter().map(|t| t.amount_cents).sum(),
        tickets,
        payment_method: request.payment_method.clone(),
        status: OrderStatus::Pending,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{EventStore, SeatState, SqliteEventStore};
    use crate::orders::SqliteOrderStore;
    use crate::testing::{fixtures, FlakyOrderStore, ManualClock};
    use chrono::Duration;

    struct Harness {
        events: Arc<SqliteEventStore>,
        orders: Arc<FlakyOrderStore>,
        clock: Arc<ManualClock>,
        checkout: CheckoutService,
    }

    fn harness(event: Event) -> Harness {
        let events = Arc::new(SqliteEventStore::in_memory().unwrap());
        events.create(&event).unwrap();
        let orders = Arc::new(FlakyOrderStore::new(Arc::new(
            SqliteOrderStore::in_memory().unwrap(),
        )));
        let clock = Arc::new(ManualClock::new(fixtures::fixture_instant()));
        let checkout = CheckoutService::new(
            EventWriter::new(Arc::clone(&events) as Arc<dyn EventStore>),
            Arc::clone(&orders) as Arc<dyn OrderStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            None,
        );
        Harness {
            events,
            orders,
            clock,
            checkout,
        }
    }

    fn request(event_id: &str, tickets: Vec<TicketRequest>) -> CheckoutRequest {
        CheckoutRequest {
            event_id: event_id.to_string(),
            holder_id: "buyer-x".to_string(),
            buyer: fixtures::buyer(),
            payment_method: "card".to_string(),
            tickets,
        }
    }

    fn a(n: u32) -> SeatRef {
        SeatRef::new("sec-a", "row-1", format!("s1-{}", n))
    }

    /// Seated event with `s1-1` and `s1-2` held by buyer-x.
    fn held_seats() -> Event {
        let mut event = fixtures::seated_event("evt-1", 1, 3);
        let expiry = fixtures::fixture_instant() + Duration::seconds(600);
        event.seat_mut(&a(1)).unwrap().place_hold("buyer-x", expiry);
        event.seat_mut(&a(2)).unwrap().place_hold("buyer-x", expiry);
        event
    }

    #[test]
    fn test_tier_commit_decrements_and_issues_codes() {
        let h = harness(fixtures::tier_event("evt-1", 5));
        let order = h
            .checkout
            .commit(&request(
                "evt-1",
                vec![TicketRequest::tier("general"), TicketRequest::tier("general")],
            ))
            .unwrap();

        assert_eq!(order.tickets.len(), 2);
        assert_eq!(order.total_cents, 5000);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_ne!(order.tickets[0].verifier_code, order.tickets[1].verifier_code);
        assert_eq!(order.tickets[0].holder_name, "Ana Torres");

        let event = h.events.get("evt-1").unwrap().unwrap();
        assert_eq!(event.tier_remaining("general"), Some(3));
        assert_eq!(event.sold, 2);
        assert!(event.invariant_violations().is_empty());
        assert!(h.checkout.get_order(&order.id).unwrap().is_some());
    }

    #[test]
    fn test_sold_out_is_all_or_nothing() {
        let h = harness(fixtures::tier_event("evt-1", 1));
        let err = h
            .checkout
            .commit(&request(
                "evt-1",
                vec![TicketRequest::tier("general"), TicketRequest::tier("general")],
            ))
            .unwrap_err();

        assert!(matches!(err, CheckoutError::SoldOut(_)));
        let event = h.events.get("evt-1").unwrap().unwrap();
        assert_eq!(event.tier_remaining("general"), Some(1));
        assert_eq!(event.version, 0);
        assert!(h.checkout.orders_for_event("evt-1").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_tier_and_empty_order() {
        let h = harness(fixtures::tier_event("evt-1", 1));
        assert!(matches!(
            h.checkout
                .commit(&request("evt-1", vec![TicketRequest::tier("vip")]))
                .unwrap_err(),
            CheckoutError::TierNotFound(_)
        ));
        assert!(matches!(
            h.checkout.commit(&request("evt-1", vec![])).unwrap_err(),
            CheckoutError::EmptyOrder
        ));
        assert!(matches!(
            h.checkout
                .commit(&request("nope", vec![TicketRequest::tier("general")]))
                .unwrap_err(),
            CheckoutError::EventNotFound(_)
        ));
    }

    #[test]
    fn test_seated_commit_occupies_held_seats() {
        let h = harness(held_seats());
        let order = h
            .checkout
            .commit(&request(
                "evt-1",
                vec![
                    TicketRequest::seat("platea", a(1)),
                    TicketRequest::seat("platea", a(2)),
                ],
            ))
            .unwrap();

        assert_eq!(order.tickets[0].seat, Some(a(1)));
        assert_eq!(order.tickets[0].sector_label.as_deref(), Some("Platea"));
        assert_eq!(order.tickets[0].seat_label.as_deref(), Some("11"));

        let event = h.events.get("evt-1").unwrap().unwrap();
        let now = h.clock.now();
        assert_eq!(event.seat_state(&a(1), now), Some(SeatState::Occupied));
        assert_eq!(event.seat_state(&a(2), now), Some(SeatState::Occupied));
        assert_eq!(event.seat_state(&a(3), now), Some(SeatState::Free));
        assert_eq!(event.tier_remaining("platea"), Some(1));
        assert!(event.invariant_violations().is_empty());
    }

    #[test]
    fn test_seat_rules() {
        let h = harness(held_seats());
        let cases = vec![
            (vec![TicketRequest::tier("platea")], "seat_required"),
            (vec![TicketRequest::seat("platea", a(3))], "seat_not_held"),
            (
                vec![
                    TicketRequest::seat("platea", a(1)),
                    TicketRequest::seat("platea", a(1)),
                ],
                "duplicate_seat",
            ),
            (
                vec![TicketRequest::seat("platea", SeatRef::new("sec-b", "row-1", "s1-1"))],
                "seat_outside_tier",
            ),
            (
                vec![TicketRequest::seat("platea", SeatRef::new("sec-a", "row-9", "x"))],
                "seat_not_found",
            ),
        ];

        for (tickets, reason) in cases {
            let err = h.checkout.commit(&request("evt-1", tickets)).unwrap_err();
            assert_eq!(err.reason(), reason, "{}", err);
        }
        assert_eq!(h.events.get("evt-1").unwrap().unwrap().version, 0);
    }

    #[test]
    fn test_seat_on_tier_event_rejected() {
        let h = harness(fixtures::tier_event("evt-1", 5));
        let err = h
            .checkout
            .commit(&request("evt-1", vec![TicketRequest::seat("general", a(1))]))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SeatOnTierEvent));
    }

    #[test]
    fn test_expired_hold_cannot_be_committed() {
        let h = harness(held_seats());
        h.clock.advance_secs(601);
        let err = h
            .checkout
            .commit(&request("evt-1", vec![TicketRequest::seat("platea", a(1))]))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SeatNotHeld(_)));
    }

    #[test]
    fn test_closed_event_rejected() {
        let mut event = fixtures::tier_event("evt-1", 5);
        event.status = EventStatus::Cancelado;
        let h = harness(event);
        let err = h
            .checkout
            .commit(&request("evt-1", vec![TicketRequest::tier("general")]))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EventClosed(EventStatus::Cancelado)));
    }

    #[test]
    fn test_order_failure_restores_inventory() {
        let h = harness(held_seats());
        h.orders.set_fail_inserts(true);

        let err = h
            .checkout
            .commit(&request(
                "evt-1",
                vec![TicketRequest::seat("platea", a(1))],
            ))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderWrite(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Transient);

        let event = h.events.get("evt-1").unwrap().unwrap();
        assert_eq!(event.tier_remaining("platea"), Some(3));
        assert_eq!(event.sold, 0);
        let seat = &event.locate(&a(1)).unwrap().seat;
        assert!(!seat.occupied);
        assert!(seat.is_held_by("buyer-x"));
        assert!(event.invariant_violations().is_empty());
        assert!(h.checkout.orders_for_event("evt-1").unwrap().is_empty());

        // The restored hold can be committed once the store recovers.
        h.orders.set_fail_inserts(false);
        h.checkout
            .commit(&request("evt-1", vec![TicketRequest::seat("platea", a(1))]))
            .unwrap();
    }

    #[test]
    fn test_attendee_overrides_buyer() {
        let h = harness(fixtures::tier_event("evt-1", 5));
        let mut ticket = TicketRequest::tier("general");
        ticket.attendee_name = Some("Luis".to_string());
        ticket.attendee_email = Some("luis@example.com".to_string());

        let order = h.checkout.commit(&request("evt-1", vec![ticket])).unwrap();
        assert_eq!(order.tickets[0].holder_name, "Luis");
        assert_eq!(order.tickets[0].holder_email, "luis@example.com");
        assert_eq!(order.buyer.email, "ana@example.com");
    }
}

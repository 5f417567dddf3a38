use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::event::Event;
use crate::models::seller::Seller;
use crate::models::ticket::{Ticket, TicketStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    pub valid: i64,
    pub used: i64,
    pub revoked: i64,
}

impl StatusCounts {
    pub fn record(&mut self, status: TicketStatus) {
        self.total += 1;
        match status {
            TicketStatus::Valid => self.valid += 1,
            TicketStatus::Used => self.used += 1,
            TicketStatus::Revoked => self.revoked += 1,
        }
    }

    fn add(&mut self, other: &StatusCounts) {
        self.total += other.total;
        self.valid += other.valid;
        self.used += other.used;
        self.revoked += other.revoked;
    }
}

/// Ticket and seller totals of one event, as the store reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct EventTotals {
    pub event_id: Uuid,
    pub valid: i64,
    pub used: i64,
    pub revoked: i64,
    /// Sum of prices of tickets that were not revoked.
    pub revenue: Decimal,
    pub sellers: i64,
    pub active_sellers: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventStats {
    pub event_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub capacity: i32,
    pub tickets_issued: i32,
    pub remaining_capacity: i32,
    pub tickets: StatusCounts,
    pub revenue: Decimal,
    pub sellers: i64,
    pub active_sellers: i64,
}

impl EventStats {
    pub fn new(event: &Event, totals: &EventTotals) -> Self {
        Self {
            event_id: event.id,
            name: event.name.clone(),
            is_active: event.is_active,
            capacity: event.capacity,
            tickets_issued: event.tickets_issued,
            remaining_capacity: event.remaining_capacity(),
            tickets: StatusCounts {
                total: totals.valid + totals.used + totals.revoked,
                valid: totals.valid,
                used: totals.used,
                revoked: totals.revoked,
            },
            revenue: totals.revenue,
            sellers: totals.sellers,
            active_sellers: totals.active_sellers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub events: i64,
    pub active_events: i64,
    pub sellers: i64,
    pub active_sellers: i64,
    pub capacity: i64,
    pub tickets: StatusCounts,
    pub revenue: Decimal,
    pub per_event: Vec<EventStats>,
}

impl DashboardStats {
    /// Rolls per-event totals up; events with no totals count as empty.
    pub fn aggregate(events: &[Event], totals: &[EventTotals]) -> Self {
        let empty = EventTotals::default();
        let per_event: Vec<EventStats> = events
            .iter()
            .map(|event| {
                let t = totals
                    .iter()
                    .find(|t| t.event_id == event.id)
                    .unwrap_or(&empty);
                EventStats::new(event, t)
            })
            .collect();

        let mut stats = DashboardStats {
            events: events.len() as i64,
            active_events: events.iter().filter(|e| e.is_active).count() as i64,
            sellers: 0,
            active_sellers: 0,
            capacity: 0,
            tickets: StatusCounts::default(),
            revenue: Decimal::ZERO,
            per_event: Vec::new(),
        };
        for event in &per_event {
            stats.sellers += event.sellers;
            stats.active_sellers += event.active_sellers;
            stats.capacity += i64::from(event.capacity);
            stats.tickets.add(&event.tickets);
            stats.revenue += event.revenue;
        }
        stats.revenue.rescale(2);
        stats.per_event = per_event;
        stats
    }
}

/// What a seller sees on their own dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SellerSummary {
    pub quota: i32,
    pub tickets_sold: i32,
    pub remaining: i32,
    pub is_active: bool,
    pub tickets: StatusCounts,
    pub revenue: Decimal,
}

impl SellerSummary {
    pub fn new(seller: &Seller, tickets: &[Ticket]) -> Self {
        let mut counts = StatusCounts::default();
        let mut revenue = Decimal::ZERO;
        for ticket in tickets {
            counts.record(ticket.status);
            if ticket.status != TicketStatus::Revoked {
                revenue += ticket.price;
            }
        }
        revenue.rescale(2);
        Self {
            quota: seller.quota,
            tickets_sold: seller.tickets_sold,
            remaining: seller.remaining(),
            is_active: seller.is_active,
            tickets: counts,
            revenue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::sample_event;
    use crate::models::seller::sample_seller;
    use crate::models::ticket::sample_ticket;

    #[test]
    fn test_dashboard_rolls_up_events() {
        let a = sample_event(100);
        let mut b = sample_event(50);
        b.is_active = false;
        let totals = vec![EventTotals {
            event_id: a.id,
            valid: 3,
            used: 2,
            revoked: 1,
            revenue: Decimal::new(12500, 2),
            sellers: 2,
            active_sellers: 1,
        }];

        let stats = DashboardStats::aggregate(&[a.clone(), b], &totals);
        assert_eq!(stats.events, 2);
        assert_eq!(stats.active_events, 1);
        assert_eq!(stats.capacity, 150);
        assert_eq!(stats.tickets.total, 6);
        assert_eq!(stats.tickets.used, 2);
        assert_eq!(stats.sellers, 2);
        assert_eq!(stats.revenue.to_string(), "125.00");
        assert_eq!(stats.per_event[1].tickets.total, 0);
    }

    #[test]
    fn test_seller_summary_skips_revoked_revenue() {
        let seller = sample_seller(Uuid::new_v4(), 10, 3);
        let tickets = vec![
            sample_ticket(TicketStatus::Valid),
            sample_ticket(TicketStatus::Used),
            sample_ticket(TicketStatus::Revoked),
        ];
        let summary = SellerSummary::new(&seller, &tickets);
        assert_eq!(summary.remaining, 7);
        assert_eq!(summary.tickets.total, 3);
        assert_eq!(summary.tickets.revoked, 1);
        assert_eq!(summary.revenue.to_string(), "50.00");
    }
}

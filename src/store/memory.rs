//! In-memory store, used when no database is configured and in tests.
//!
//! All state sits behind one `RwLock`; every operation that checks and then
//! writes does both under the same write guard.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::event::UpdateEventRequest;
use crate::models::ticket::ticket_number;
use crate::models::{
    Account, AdminRole, Buyer, Event, EventAdmin, EventTotals, NewAccount, NewEvent, Seller,
    Ticket, TicketAction, TicketFilter, TicketStatus, MAX_ADMINS_PER_EVENT,
};
use crate::tickets::code;
use crate::utils::error::AppError;

#[derive(Debug, Clone)]
struct Membership {
    role: AdminRole,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    events: HashMap<Uuid, Event>,
    admins: HashMap<(Uuid, Uuid), Membership>,
    sellers: HashMap<Uuid, Seller>,
    tickets: HashMap<Uuid, Ticket>,
    codes: HashMap<String, Uuid>,
}

impl Inner {
    fn insert_account(&mut self, new: NewAccount, now: DateTime<Utc>) -> Result<Account, AppError> {
        if self.accounts.values().any(|a| a.email == new.email) {
            return Err(AppError::Conflict(format!(
                "An account with email '{}' already exists",
                new.email
            )));
        }
        let account = Account {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn event_admin(&self, event_id: Uuid, account_id: Uuid) -> Option<EventAdmin> {
        let membership = self.admins.get(&(event_id, account_id))?;
        let account = self.accounts.get(&account_id)?;
        Some(EventAdmin {
            event_id,
            account_id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: membership.role,
            created_at: membership.created_at,
        })
    }

    fn check_admin_capacity(&self, event_id: Uuid) -> Result<(), AppError> {
        if !self.events.contains_key(&event_id) {
            return Err(AppError::NotFound(format!("Event {event_id} not found")));
        }
        let count = self.admins.keys().filter(|(e, _)| *e == event_id).count();
        if count >= MAX_ADMINS_PER_EVENT {
            return Err(AppError::Conflict(format!(
                "An event can have at most {MAX_ADMINS_PER_EVENT} admins"
            )));
        }
        Ok(())
    }

    fn attach_admin(
        &mut self,
        event_id: Uuid,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventAdmin, AppError> {
        self.admins.insert(
            (event_id, account_id),
            Membership {
                role: AdminRole::Admin,
                created_at: now,
            },
        );
        self.event_admin(event_id, account_id)
            .ok_or_else(|| AppError::NotFound(format!("Account {account_id} not found")))
    }

    fn unique_code(&self) -> String {
        loop {
            let candidate = code::generate();
            if !self.codes.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_account(&self, new: NewAccount) -> Result<Account, AppError> {
        self.inner.write().await.insert_account(new, Utc::now())
    }

    pub async fn account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    pub async fn account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    pub async fn create_event(&self, new: NewEvent, owner_id: Uuid) -> Result<Event, AppError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            date: new.date,
            location: new.location,
            capacity: new.capacity,
            ticket_price: new.ticket_price,
            is_active: true,
            tickets_issued: 0,
            created_at: now,
            updated_at: now,
        };
        inner.events.insert(event.id, event.clone());
        inner.admins.insert(
            (event.id, owner_id),
            Membership {
                role: AdminRole::Owner,
                created_at: now,
            },
        );
        Ok(event)
    }

    pub async fn event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        update: UpdateEventRequest,
    ) -> Result<Event, AppError> {
        let mut inner = self.inner.write().await;
        let event = inner
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Event {id} not found")))?;
        let mut updated = event.clone();
        update.apply_to(&mut updated)?;
        updated.updated_at = Utc::now();
        *event = updated.clone();
        Ok(updated)
    }

    pub async fn events_for_admin(&self, account_id: Uuid) -> Result<Vec<Event>, AppError> {
        let inner = self.inner.read().await;
        let mut events: Vec<Event> = inner
            .admins
            .keys()
            .filter(|(_, account)| *account == account_id)
            .filter_map(|(event_id, _)| inner.events.get(event_id).cloned())
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        Ok(events)
    }

    pub async fn admin_role(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<AdminRole>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.admins.get(&(event_id, account_id)).map(|m| m.role))
    }

    pub async fn event_admins(&self, event_id: Uuid) -> Result<Vec<EventAdmin>, AppError> {
        let inner = self.inner.read().await;
        let mut admins: Vec<EventAdmin> = inner
            .admins
            .keys()
            .filter(|(event, _)| *event == event_id)
            .filter_map(|(event, account)| inner.event_admin(*event, *account))
            .collect();
        admins.sort_by_key(|a| (a.role != AdminRole::Owner, a.created_at));
        Ok(admins)
    }

    pub async fn add_event_admin(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<EventAdmin, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.accounts.contains_key(&account_id) {
            return Err(AppError::NotFound(format!("Account {account_id} not found")));
        }
        if inner.admins.contains_key(&(event_id, account_id)) {
            return Err(AppError::Conflict(
                "This account is already an admin of the event".to_string(),
            ));
        }
        inner.check_admin_capacity(event_id)?;
        inner.attach_admin(event_id, account_id, Utc::now())
    }

    /// Creates an admin account and its membership together; nothing is
    /// written when the event is already full.
    pub async fn create_event_admin(
        &self,
        event_id: Uuid,
        account: NewAccount,
    ) -> Result<EventAdmin, AppError> {
        let mut inner = self.inner.write().await;
        inner.check_admin_capacity(event_id)?;
        let now = Utc::now();
        let account = inner.insert_account(account, now)?;
        inner.attach_admin(event_id, account.id, now)
    }

    pub async fn remove_event_admin(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        match inner.admins.get(&(event_id, account_id)).map(|m| m.role) {
            None => Err(AppError::NotFound("Admin not found for this event".to_string())),
            Some(AdminRole::Owner) => Err(AppError::Forbidden(
                "The event owner cannot be removed".to_string(),
            )),
            Some(AdminRole::Admin) => {
                inner.admins.remove(&(event_id, account_id));
                Ok(())
            }
        }
    }

    pub async fn create_seller(
        &self,
        account: NewAccount,
        event_id: Uuid,
        quota: i32,
    ) -> Result<Seller, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.events.contains_key(&event_id) {
            return Err(AppError::NotFound(format!("Event {event_id} not found")));
        }
        let now = Utc::now();
        let account = inner.insert_account(account, now)?;
        let seller = Seller {
            id: account.id,
            event_id,
            name: account.name,
            email: account.email,
            quota,
            tickets_sold: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.sellers.insert(seller.id, seller.clone());
        Ok(seller)
    }

    pub async fn seller(&self, id: Uuid) -> Result<Option<Seller>, AppError> {
        Ok(self.inner.read().await.sellers.get(&id).cloned())
    }

    pub async fn sellers_for_events(&self, event_ids: &[Uuid]) -> Result<Vec<Seller>, AppError> {
        let inner = self.inner.read().await;
        let mut sellers: Vec<Seller> = inner
            .sellers
            .values()
            .filter(|s| event_ids.contains(&s.event_id))
            .cloned()
            .collect();
        sellers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(sellers)
    }

    pub async fn update_seller_quota(&self, id: Uuid, quota: i32) -> Result<Seller, AppError> {
        let mut inner = self.inner.write().await;
        let seller = inner
            .sellers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Seller {id} not found")))?;
        seller.quota = seller.check_quota(quota)?;
        seller.updated_at = Utc::now();
        Ok(seller.clone())
    }

    pub async fn set_seller_active(&self, id: Uuid, is_active: bool) -> Result<Seller, AppError> {
        let mut inner = self.inner.write().await;
        let seller = inner
            .sellers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Seller {id} not found")))?;
        seller.is_active = is_active;
        seller.updated_at = Utc::now();
        Ok(seller.clone())
    }

    pub async fn issue_tickets(
        &self,
        seller_id: Uuid,
        buyer: &Buyer,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut inner = self.inner.write().await;

        let seller = inner
            .sellers
            .get(&seller_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Seller {seller_id} not found")))?;
        seller.ensure_can_issue(quantity)?;

        let event = inner
            .events
            .get(&seller.event_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", seller.event_id)))?;
        event.ensure_can_issue(quantity)?;

        let mut issued = Vec::with_capacity(quantity as usize);
        for i in 0..quantity {
            let cryptic_code = inner.unique_code();
            let ticket = Ticket {
                id: Uuid::new_v4(),
                event_id: event.id,
                seller_id,
                ticket_number: ticket_number(event.tickets_issued + i + 1),
                cryptic_code: cryptic_code.clone(),
                buyer_name: buyer.name.clone(),
                buyer_email: buyer.email.clone(),
                buyer_phone: buyer.phone.clone(),
                price: event.ticket_price,
                status: TicketStatus::Valid,
                generated_at: now,
                used_at: None,
                revoked_at: None,
                updated_at: now,
            };
            inner.codes.insert(cryptic_code, ticket.id);
            inner.tickets.insert(ticket.id, ticket.clone());
            issued.push(ticket);
        }

        if let Some(seller) = inner.sellers.get_mut(&seller_id) {
            seller.tickets_sold += quantity;
            seller.updated_at = now;
        }
        if let Some(event) = inner.events.get_mut(&event.id) {
            event.tickets_issued += quantity;
            event.updated_at = now;
        }
        Ok(issued)
    }

    pub async fn ticket(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(self.inner.read().await.tickets.get(&id).cloned())
    }

    pub async fn ticket_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .codes
            .get(code)
            .and_then(|id| inner.tickets.get(id))
            .cloned())
    }

    pub async fn list_tickets(
        &self,
        scope: &[Uuid],
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, AppError> {
        let inner = self.inner.read().await;
        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| scope.contains(&t.event_id) && filter.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| b.ticket_number.cmp(&a.ticket_number))
        });
        Ok(tickets)
    }

    pub async fn transition_ticket(
        &self,
        id: Uuid,
        action: TicketAction,
        now: DateTime<Utc>,
    ) -> Result<Ticket, AppError> {
        let mut inner = self.inner.write().await;
        let ticket = inner
            .tickets
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket {id} not found")))?;
        ticket.apply(action, now)?;
        Ok(ticket.clone())
    }

    pub async fn event_totals(&self, event_ids: &[Uuid]) -> Result<Vec<EventTotals>, AppError> {
        let inner = self.inner.read().await;
        let totals = event_ids
            .iter()
            .map(|&event_id| {
                let mut totals = EventTotals {
                    event_id,
                    revenue: Decimal::ZERO,
                    ..Default::default()
                };
                for ticket in inner.tickets.values().filter(|t| t.event_id == event_id) {
                    match ticket.status {
                        TicketStatus::Valid => totals.valid += 1,
                        TicketStatus::Used => totals.used += 1,
                        TicketStatus::Revoked => totals.revoked += 1,
                    }
                    if ticket.status != TicketStatus::Revoked {
                        totals.revenue += ticket.price;
                    }
                }
                for seller in inner.sellers.values().filter(|s| s.event_id == event_id) {
                    totals.sellers += 1;
                    if seller.is_active {
                        totals.active_sellers += 1;
                    }
                }
                totals
            })
            .collect();
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountRole;
    use chrono::Duration;

    fn new_account(email: &str, role: AccountRole) -> NewAccount {
        NewAccount {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$unused".to_string(),
            role,
        }
    }

    fn new_event(capacity: i32) -> NewEvent {
        NewEvent {
            name: "Gala".to_string(),
            description: None,
            date: Utc::now() + Duration::days(30),
            location: "Hall".to_string(),
            capacity,
            ticket_price: Decimal::new(1000, 2),
        }
    }

    fn buyer() -> Buyer {
        Buyer {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
        }
    }

    async fn seeded(capacity: i32, quota: i32) -> (MemoryStore, Event, Seller) {
        let store = MemoryStore::new();
        let admin = store
            .create_account(new_account("admin@example.com", AccountRole::Admin))
            .await
            .unwrap();
        let event = store.create_event(new_event(capacity), admin.id).await.unwrap();
        let seller = store
            .create_seller(
                new_account("seller@example.com", AccountRole::Seller),
                event.id,
                quota,
            )
            .await
            .unwrap();
        (store, event, seller)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store
            .create_account(new_account("a@example.com", AccountRole::Admin))
            .await
            .unwrap();
        let err = store
            .create_account(new_account("a@example.com", AccountRole::Seller))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_issue_respects_quota_and_numbers_tickets() {
        let (store, event, seller) = seeded(100, 3).await;
        let first = store
            .issue_tickets(seller.id, &buyer(), 2, Utc::now())
            .await
            .unwrap();
        assert_eq!(first[0].ticket_number, "BLT-000001");
        assert_eq!(first[1].ticket_number, "BLT-000002");
        assert_ne!(first[0].cryptic_code, first[1].cryptic_code);
        assert_eq!(first[0].price, event.ticket_price);

        let err = store
            .issue_tickets(seller.id, &buyer(), 2, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { .. }));

        let seller = store.seller(seller.id).await.unwrap().unwrap();
        assert_eq!(seller.tickets_sold, 2);
        let event = store.event(event.id).await.unwrap().unwrap();
        assert_eq!(event.tickets_issued, 2);
    }

    #[tokio::test]
    async fn test_capacity_caps_all_sellers() {
        let (store, event, seller) = seeded(2, 10).await;
        store
            .issue_tickets(seller.id, &buyer(), 2, Utc::now())
            .await
            .unwrap();
        let other = store
            .create_seller(
                new_account("other@example.com", AccountRole::Seller),
                event.id,
                10,
            )
            .await
            .unwrap();
        let err = store
            .issue_tickets(other.id, &buyer(), 1, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_issue_never_exceeds_quota() {
        let (store, _event, seller) = seeded(1000, 25).await;
        let seller_id = seller.id;
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.issue_tickets(seller_id, &buyer(), 1, Utc::now()).await
            }));
        }
        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 25);
        let seller = store.seller(seller.id).await.unwrap().unwrap();
        assert_eq!(seller.tickets_sold, 25);
    }

    #[tokio::test]
    async fn test_scan_only_admits_once() {
        let (store, _event, seller) = seeded(10, 10).await;
        let ticket = store
            .issue_tickets(seller.id, &buyer(), 1, Utc::now())
            .await
            .unwrap()
            .remove(0);

        let found = store
            .ticket_by_code(&ticket.cryptic_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, ticket.id);

        let scanned = store
            .transition_ticket(ticket.id, TicketAction::Scan, Utc::now())
            .await
            .unwrap();
        assert_eq!(scanned.status, TicketStatus::Used);
        let err = store
            .transition_ticket(ticket.id, TicketAction::Scan, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TicketAlreadyUsed { .. }));
    }

    #[tokio::test]
    async fn test_admin_limit_and_owner_protection() {
        let store = MemoryStore::new();
        let owner = store
            .create_account(new_account("owner@example.com", AccountRole::Admin))
            .await
            .unwrap();
        let event = store.create_event(new_event(10), owner.id).await.unwrap();

        let mut extra = Vec::new();
        for i in 0..3 {
            let account = store
                .create_account(new_account(&format!("a{i}@example.com"), AccountRole::Admin))
                .await
                .unwrap();
            extra.push(account.id);
        }
        store.add_event_admin(event.id, extra[0]).await.unwrap();
        store.add_event_admin(event.id, extra[1]).await.unwrap();
        let err = store.add_event_admin(event.id, extra[2]).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let admins = store.event_admins(event.id).await.unwrap();
        assert_eq!(admins.len(), 3);
        assert_eq!(admins[0].role, AdminRole::Owner);

        let err = store
            .remove_event_admin(event.id, owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        store.remove_event_admin(event.id, extra[0]).await.unwrap();
        store.add_event_admin(event.id, extra[2]).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_event_creates_no_admin_account() {
        let store = MemoryStore::new();
        let owner = store
            .create_account(new_account("owner@example.com", AccountRole::Admin))
            .await
            .unwrap();
        let event = store.create_event(new_event(10), owner.id).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = store.clone();
            let event_id = event.id;
            handles.push(tokio::spawn(async move {
                store
                    .create_event_admin(
                        event_id,
                        new_account(&format!("racer{i}@example.com"), AccountRole::Admin),
                    )
                    .await
            }));
        }
        let mut added = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => added += 1,
                Err(err) => assert!(matches!(err, AppError::Conflict(_))),
            }
        }
        assert_eq!(added, 2);

        let mut accounts = 0;
        for i in 0..4 {
            let email = format!("racer{i}@example.com");
            if store.account_by_email(&email).await.unwrap().is_some() {
                accounts += 1;
            }
        }
        assert_eq!(accounts, 2);
        assert_eq!(store.event_admins(event.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_event_totals_exclude_revoked_revenue() {
        let (store, event, seller) = seeded(10, 10).await;
        let tickets = store
            .issue_tickets(seller.id, &buyer(), 3, Utc::now())
            .await
            .unwrap();
        store
            .transition_ticket(tickets[0].id, TicketAction::Revoke, Utc::now())
            .await
            .unwrap();
        store
            .transition_ticket(tickets[1].id, TicketAction::Scan, Utc::now())
            .await
            .unwrap();

        let totals = store.event_totals(&[event.id]).await.unwrap();
        assert_eq!(totals[0].valid, 1);
        assert_eq!(totals[0].used, 1);
        assert_eq!(totals[0].revoked, 1);
        assert_eq!(totals[0].revenue, Decimal::new(2000, 2));
        assert_eq!(totals[0].sellers, 1);
    }
}

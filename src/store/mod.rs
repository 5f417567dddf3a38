//! Persistence. `Store` is Postgres when a database is configured and an
//! in-memory map otherwise; both honour the same invariants.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::password;
use crate::config::{BootstrapAdmin, Config};
use crate::models::event::UpdateEventRequest;
use crate::models::{
    Account, AccountRole, AdminRole, Buyer, Event, EventAdmin, EventTotals, NewAccount, NewEvent,
    Seller, Ticket, TicketAction, TicketFilter,
};
use crate::utils::error::AppError;
use crate::utils::validate;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Clone)]
pub enum Store {
    Postgres(PgStore),
    Memory(MemoryStore),
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            Store::Postgres(store) => store.$method($($arg),*).await,
            Store::Memory(store) => store.$method($($arg),*).await,
        }
    };
}

impl Store {
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        match &config.database_url {
            Some(url) => Ok(Store::Postgres(
                PgStore::connect(url, config.database_max_connections).await?,
            )),
            None => Ok(Store::Memory(MemoryStore::new())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Store::Postgres(_) => "postgres",
            Store::Memory(_) => "memory",
        }
    }

    pub async fn create_account(&self, new: NewAccount) -> Result<Account, AppError> {
        dispatch!(self.create_account(new))
    }

    pub async fn account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        dispatch!(self.account_by_email(email))
    }

    pub async fn account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        dispatch!(self.account_by_id(id))
    }

    /// Creates the event with `owner_id` as its owner admin.
    pub async fn create_event(&self, new: NewEvent, owner_id: Uuid) -> Result<Event, AppError> {
        dispatch!(self.create_event(new, owner_id))
    }

    pub async fn event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        dispatch!(self.event(id))
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        update: UpdateEventRequest,
    ) -> Result<Event, AppError> {
        dispatch!(self.update_event(id, update))
    }

    pub async fn events_for_admin(&self, account_id: Uuid) -> Result<Vec<Event>, AppError> {
        dispatch!(self.events_for_admin(account_id))
    }

    pub async fn admin_role(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<AdminRole>, AppError> {
        dispatch!(self.admin_role(event_id, account_id))
    }

    pub async fn event_admins(&self, event_id: Uuid) -> Result<Vec<EventAdmin>, AppError> {
        dispatch!(self.event_admins(event_id))
    }

    pub async fn add_event_admin(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<EventAdmin, AppError> {
        dispatch!(self.add_event_admin(event_id, account_id))
    }

    /// Creates a new admin account and adds it to the event in one step.
    pub async fn create_event_admin(
        &self,
        event_id: Uuid,
        account: NewAccount,
    ) -> Result<EventAdmin, AppError> {
        dispatch!(self.create_event_admin(event_id, account))
    }

    pub async fn remove_event_admin(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), AppError> {
        dispatch!(self.remove_event_admin(event_id, account_id))
    }

    /// Creates the seller's account and binds it to `event_id`.
    pub async fn create_seller(
        &self,
        account: NewAccount,
        event_id: Uuid,
        quota: i32,
    ) -> Result<Seller, AppError> {
        dispatch!(self.create_seller(account, event_id, quota))
    }

    pub async fn seller(&self, id: Uuid) -> Result<Option<Seller>, AppError> {
        dispatch!(self.seller(id))
    }

    pub async fn sellers_for_events(&self, event_ids: &[Uuid]) -> Result<Vec<Seller>, AppError> {
        dispatch!(self.sellers_for_events(event_ids))
    }

    pub async fn update_seller_quota(&self, id: Uuid, quota: i32) -> Result<Seller, AppError> {
        dispatch!(self.update_seller_quota(id, quota))
    }

    pub async fn set_seller_active(&self, id: Uuid, is_active: bool) -> Result<Seller, AppError> {
        dispatch!(self.set_seller_active(id, is_active))
    }

    /// Issues `quantity` tickets atomically, or none if the seller's quota or
    /// the event's capacity would be exceeded.
    pub async fn issue_tickets(
        &self,
        seller_id: Uuid,
        buyer: &Buyer,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError> {
        dispatch!(self.issue_tickets(seller_id, buyer, quantity, now))
    }

    pub async fn ticket(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        dispatch!(self.ticket(id))
    }

    pub async fn ticket_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        dispatch!(self.ticket_by_code(code))
    }

    /// Tickets of the events in `scope` that match `filter`, newest first.
    pub async fn list_tickets(
        &self,
        scope: &[Uuid],
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, AppError> {
        dispatch!(self.list_tickets(scope, filter))
    }

    pub async fn transition_ticket(
        &self,
        id: Uuid,
        action: TicketAction,
        now: DateTime<Utc>,
    ) -> Result<Ticket, AppError> {
        dispatch!(self.transition_ticket(id, action, now))
    }

    pub async fn event_totals(&self, event_ids: &[Uuid]) -> Result<Vec<EventTotals>, AppError> {
        dispatch!(self.event_totals(event_ids))
    }
}

/// Creates the configured first admin unless an account with that email
/// already exists.
pub async fn ensure_bootstrap_admin(store: &Store, admin: &BootstrapAdmin) -> Result<(), AppError> {
    let email = validate::email(&admin.email)?;
    if store.account_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "Bootstrap admin already present");
        return Ok(());
    }

    let account = store
        .create_account(NewAccount {
            name: validate::required("name", &admin.name)?,
            email,
            password_hash: password::hash(validate::password(&admin.password)?)?,
            role: AccountRole::Admin,
        })
        .await?;
    tracing::info!(account_id = %account.id, email = %account.email, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let store = Store::Memory(MemoryStore::new());
        let admin = BootstrapAdmin {
            name: "Root".to_string(),
            email: "Root@Example.com".to_string(),
            password: "long enough".to_string(),
        };
        ensure_bootstrap_admin(&store, &admin).await.unwrap();
        ensure_bootstrap_admin(&store, &admin).await.unwrap();

        let account = store
            .account_by_email("root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.role, AccountRole::Admin);
        assert!(password::verify("long enough", &account.password_hash));
        assert_eq!(store.kind(), "memory");
    }
}

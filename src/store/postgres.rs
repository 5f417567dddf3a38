//! Postgres store over a sqlx pool.
//!
//! Checks that guard a write (quota, capacity, admin limit, status) run in the
//! same transaction as the write, with the guarded rows locked `FOR UPDATE`.
//! Lock order is seller before event.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::event::UpdateEventRequest;
use crate::models::ticket::ticket_number;
use crate::models::{
    Account, AdminRole, Buyer, Event, EventAdmin, EventTotals, NewAccount, NewEvent, Seller,
    Ticket, TicketAction, TicketFilter, MAX_ADMINS_PER_EVENT,
};
use crate::tickets::code;
use crate::utils::error::AppError;

const SELLER_SELECT: &str = "SELECT s.id, s.event_id, a.name, a.email, s.quota, s.tickets_sold, \
     s.is_active, s.created_at, s.updated_at \
     FROM sellers s JOIN accounts a ON a.id = s.id";

const EVENT_ADMIN_SELECT: &str = "SELECT ea.event_id, ea.account_id, a.name, a.email, ea.role, \
     ea.created_at \
     FROM event_admins ea JOIN accounts a ON a.id = ea.account_id";

const CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("Successfully connected to database");

        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("migrations failed: {e}")))?;
        tracing::info!("Migrations run successfully");

        Ok(Self { pool })
    }

    pub async fn create_account(&self, new: NewAccount) -> Result<Account, AppError> {
        let mut tx = self.pool.begin().await?;
        let account = insert_account(&mut tx, new).await?;
        tx.commit().await?;
        Ok(account)
    }

    pub async fn account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        Ok(
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn create_event(&self, new: NewEvent, owner_id: Uuid) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let event = sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, name, description, date, location, capacity, ticket_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.date)
        .bind(&new.location)
        .bind(new.capacity)
        .bind(new.ticket_price)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO event_admins (event_id, account_id, role) VALUES ($1, $2, $3)")
            .bind(event.id)
            .bind(owner_id)
            .bind(AdminRole::Owner.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(event)
    }

    pub async fn event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(
            sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        update: UpdateEventRequest,
    ) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_event(&mut tx, id).await?;
        update.apply_to(&mut event)?;

        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET name = $2, description = $3, date = $4, location = $5, \
             capacity = $6, ticket_price = $7, is_active = $8, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.capacity)
        .bind(event.ticket_price)
        .bind(event.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(event)
    }

    pub async fn events_for_admin(&self, account_id: Uuid) -> Result<Vec<Event>, AppError> {
        Ok(sqlx::query_as::<_, Event>(
            "SELECT e.* FROM events e JOIN event_admins ea ON ea.event_id = e.id \
             WHERE ea.account_id = $1 ORDER BY e.date, e.name",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn admin_role(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<AdminRole>, AppError> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM event_admins WHERE event_id = $1 AND account_id = $2",
        )
        .bind(event_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        role.map(AdminRole::try_from)
            .transpose()
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }

    pub async fn event_admins(&self, event_id: Uuid) -> Result<Vec<EventAdmin>, AppError> {
        Ok(sqlx::query_as::<_, EventAdmin>(&format!(
            "{EVENT_ADMIN_SELECT} WHERE ea.event_id = $1 \
             ORDER BY (ea.role <> 'owner'), ea.created_at"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn add_event_admin(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<EventAdmin, AppError> {
        let mut tx = self.pool.begin().await?;
        let existing = lock_admins(&mut tx, event_id).await?;
        if existing.contains(&account_id) {
            return Err(AppError::Conflict(
                "This account is already an admin of the event".to_string(),
            ));
        }
        let admin = attach_admin(&mut tx, event_id, account_id).await?;
        tx.commit().await?;
        Ok(admin)
    }

    pub async fn create_event_admin(
        &self,
        event_id: Uuid,
        account: NewAccount,
    ) -> Result<EventAdmin, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_admins(&mut tx, event_id).await?;
        let account = insert_account(&mut tx, account).await?;
        let admin = attach_admin(&mut tx, event_id, account.id).await?;
        tx.commit().await?;
        Ok(admin)
    }

    pub async fn remove_event_admin(
        &self,
        event_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM event_admins WHERE event_id = $1 AND account_id = $2 FOR UPDATE",
        )
        .bind(event_id)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        match role.map(AdminRole::try_from).transpose() {
            Ok(None) => Err(AppError::NotFound(
                "Admin not found for this event".to_string(),
            )),
            Ok(Some(AdminRole::Owner)) => Err(AppError::Forbidden(
                "The event owner cannot be removed".to_string(),
            )),
            Ok(Some(AdminRole::Admin)) => {
                sqlx::query("DELETE FROM event_admins WHERE event_id = $1 AND account_id = $2")
                    .bind(event_id)
                    .bind(account_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(())
            }
            Err(e) => Err(AppError::InternalServerError(e.to_string())),
        }
    }

    pub async fn create_seller(
        &self,
        account: NewAccount,
        event_id: Uuid,
        quota: i32,
    ) -> Result<Seller, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_event(&mut tx, event_id).await?;
        let account = insert_account(&mut tx, account).await?;

        sqlx::query("INSERT INTO sellers (id, event_id, quota) VALUES ($1, $2, $3)")
            .bind(account.id)
            .bind(event_id)
            .bind(quota)
            .execute(&mut *tx)
            .await?;

        let seller = sqlx::query_as::<_, Seller>(&format!("{SELLER_SELECT} WHERE s.id = $1"))
            .bind(account.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(seller)
    }

    pub async fn seller(&self, id: Uuid) -> Result<Option<Seller>, AppError> {
        Ok(
            sqlx::query_as::<_, Seller>(&format!("{SELLER_SELECT} WHERE s.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn sellers_for_events(&self, event_ids: &[Uuid]) -> Result<Vec<Seller>, AppError> {
        Ok(sqlx::query_as::<_, Seller>(&format!(
            "{SELLER_SELECT} WHERE s.event_id = ANY($1) ORDER BY s.created_at, a.name"
        ))
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn update_seller_quota(&self, id: Uuid, quota: i32) -> Result<Seller, AppError> {
        let mut tx = self.pool.begin().await?;
        let seller = lock_seller(&mut tx, id).await?;
        let quota = seller.check_quota(quota)?;

        sqlx::query("UPDATE sellers SET quota = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(quota)
            .execute(&mut *tx)
            .await?;

        let seller = sqlx::query_as::<_, Seller>(&format!("{SELLER_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(seller)
    }

    pub async fn set_seller_active(&self, id: Uuid, is_active: bool) -> Result<Seller, AppError> {
        let updated = sqlx::query(
            "UPDATE sellers SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Seller {id} not found")));
        }
        self.seller(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Seller {id} not found")))
    }

    pub async fn issue_tickets(
        &self,
        seller_id: Uuid,
        buyer: &Buyer,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut tx = self.pool.begin().await?;

        let seller = lock_seller(&mut tx, seller_id).await?;
        seller.ensure_can_issue(quantity)?;
        let event = lock_event(&mut tx, seller.event_id).await?;
        event.ensure_can_issue(quantity)?;

        let mut issued = Vec::with_capacity(quantity as usize);
        for i in 0..quantity {
            let number = ticket_number(event.tickets_issued + i + 1);
            let mut inserted = None;
            for _ in 0..CODE_ATTEMPTS {
                inserted = sqlx::query_as::<_, Ticket>(
                    "INSERT INTO tickets (id, event_id, seller_id, ticket_number, cryptic_code, \
                     buyer_name, buyer_email, buyer_phone, price, status, generated_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'valid', $10, $10) \
                     ON CONFLICT (cryptic_code) DO NOTHING RETURNING *",
                )
                .bind(Uuid::new_v4())
                .bind(event.id)
                .bind(seller_id)
                .bind(&number)
                .bind(code::generate())
                .bind(&buyer.name)
                .bind(&buyer.email)
                .bind(&buyer.phone)
                .bind(event.ticket_price)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?;
                if inserted.is_some() {
                    break;
                }
                tracing::warn!(event_id = %event.id, "Cryptic code collision, retrying");
            }
            let ticket = inserted.ok_or_else(|| {
                AppError::InternalServerError("could not allocate a unique ticket code".to_string())
            })?;
            issued.push(ticket);
        }

        sqlx::query(
            "UPDATE sellers SET tickets_sold = tickets_sold + $2, updated_at = $3 WHERE id = $1",
        )
        .bind(seller_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE events SET tickets_issued = tickets_issued + $2, updated_at = $3 WHERE id = $1",
        )
        .bind(event.id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(issued)
    }

    pub async fn ticket(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn ticket_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        Ok(
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE cryptic_code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_tickets(
        &self,
        scope: &[Uuid],
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, AppError> {
        Ok(sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE event_id = ANY($1) \
             AND ($2::uuid IS NULL OR event_id = $2) \
             AND ($3::uuid IS NULL OR seller_id = $3) \
             AND ($4::text IS NULL OR status = $4) \
             ORDER BY generated_at DESC, ticket_number DESC",
        )
        .bind(scope)
        .bind(filter.event_id)
        .bind(filter.seller_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?)
    }

    /// Conditional update: only applies while the ticket is still in the
    /// status the action requires, so a ticket is admitted at most once.
    pub async fn transition_ticket(
        &self,
        id: Uuid,
        action: TicketAction,
        now: DateTime<Utc>,
    ) -> Result<Ticket, AppError> {
        let target = action.target_status().as_str();
        let updated = sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = $2::text, \
             used_at = CASE WHEN $2::text = 'used' THEN $3 ELSE used_at END, \
             revoked_at = CASE WHEN $2::text = 'revoked' THEN $3 \
                               WHEN $2::text = 'valid' THEN NULL ELSE revoked_at END, \
             updated_at = $3 \
             WHERE id = $1 AND status = $4 RETURNING *",
        )
        .bind(id)
        .bind(target)
        .bind(now)
        .bind(action.required_status().as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ticket) = updated {
            return Ok(ticket);
        }

        let current = self
            .ticket(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {id} not found")))?;
        Err(current.check(action).err().unwrap_or_else(|| {
            AppError::Conflict("Ticket was modified concurrently, please retry".to_string())
        }))
    }

    pub async fn event_totals(&self, event_ids: &[Uuid]) -> Result<Vec<EventTotals>, AppError> {
        Ok(sqlx::query_as::<_, EventTotals>(
            "SELECT e.id AS event_id, \
                    COALESCE(t.valid, 0) AS valid, \
                    COALESCE(t.used, 0) AS used, \
                    COALESCE(t.revoked, 0) AS revoked, \
                    COALESCE(t.revenue, 0)::NUMERIC(14, 2) AS revenue, \
                    COALESCE(s.sellers, 0) AS sellers, \
                    COALESCE(s.active_sellers, 0) AS active_sellers \
             FROM events e \
             LEFT JOIN ( \
                 SELECT event_id, \
                        COUNT(*) FILTER (WHERE status = 'valid') AS valid, \
                        COUNT(*) FILTER (WHERE status = 'used') AS used, \
                        COUNT(*) FILTER (WHERE status = 'revoked') AS revoked, \
                        SUM(price) FILTER (WHERE status <> 'revoked') AS revenue \
                 FROM tickets WHERE event_id = ANY($1) GROUP BY event_id \
             ) t ON t.event_id = e.id \
             LEFT JOIN ( \
                 SELECT event_id, \
                        COUNT(*) AS sellers, \
                        COUNT(*) FILTER (WHERE is_active) AS active_sellers \
                 FROM sellers WHERE event_id = ANY($1) GROUP BY event_id \
             ) s ON s.event_id = e.id \
             WHERE e.id = ANY($1)",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?)
    }
}

async fn insert_account(
    tx: &mut Transaction<'_, Postgres>,
    new: NewAccount,
) -> Result<Account, AppError> {
    sqlx::query_as::<_, Account>(
        "INSERT INTO accounts (id, name, email, password_hash, role) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(new.role.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
            "An account with email '{}' already exists",
            new.email
        )),
        other => AppError::DatabaseError(other),
    })
}

/// Locks the event row, serializing admin changes for it, and returns the
/// current admin ids. Fails when the event already has the maximum.
async fn lock_admins(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
) -> Result<Vec<Uuid>, AppError> {
    lock_event(tx, event_id).await?;
    let existing: Vec<Uuid> =
        sqlx::query_scalar("SELECT account_id FROM event_admins WHERE event_id = $1")
            .bind(event_id)
            .fetch_all(&mut **tx)
            .await?;
    if existing.len() >= MAX_ADMINS_PER_EVENT {
        return Err(AppError::Conflict(format!(
            "An event can have at most {MAX_ADMINS_PER_EVENT} admins"
        )));
    }
    Ok(existing)
}

async fn attach_admin(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    account_id: Uuid,
) -> Result<EventAdmin, AppError> {
    sqlx::query("INSERT INTO event_admins (event_id, account_id, role) VALUES ($1, $2, $3)")
        .bind(event_id)
        .bind(account_id)
        .bind(AdminRole::Admin.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(sqlx::query_as::<_, EventAdmin>(&format!(
        "{EVENT_ADMIN_SELECT} WHERE ea.event_id = $1 AND ea.account_id = $2"
    ))
    .bind(event_id)
    .bind(account_id)
    .fetch_one(&mut **tx)
    .await?)
}

async fn lock_event(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Event, AppError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {id} not found")))
}

async fn lock_seller(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Seller, AppError> {
    sqlx::query_as::<_, Seller>(&format!("{SELLER_SELECT} WHERE s.id = $1 FOR UPDATE OF s"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Seller {id} not found")))
}

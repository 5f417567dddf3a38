use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::tickets::{code, qr};
use crate::utils::error::AppError;
use crate::utils::validate;

pub const MAX_TICKETS_PER_REQUEST: i32 = 10;

/// Prices are shown in NSL.
pub const CURRENCY: &str = "NSL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Valid,
    Used,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAction {
    Scan,
    Revoke,
    Restore,
}

#[derive(Debug, Error)]
#[error("unknown ticket status '{0}'")]
pub struct UnknownStatus(String);

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Valid => "valid",
            TicketStatus::Used => "used",
            TicketStatus::Revoked => "revoked",
        }
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "valid" => Ok(TicketStatus::Valid),
            "used" => Ok(TicketStatus::Used),
            "revoked" => Ok(TicketStatus::Revoked),
            _ => Err(UnknownStatus(value)),
        }
    }
}

impl TicketAction {
    /// Status a ticket must be in for the action to apply.
    pub fn required_status(self) -> TicketStatus {
        match self {
            TicketAction::Scan | TicketAction::Revoke => TicketStatus::Valid,
            TicketAction::Restore => TicketStatus::Revoked,
        }
    }

    pub fn target_status(self) -> TicketStatus {
        match self {
            TicketAction::Scan => TicketStatus::Used,
            TicketAction::Revoke => TicketStatus::Revoked,
            TicketAction::Restore => TicketStatus::Valid,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            TicketAction::Scan => "scan",
            TicketAction::Revoke => "revoke",
            TicketAction::Restore => "restore",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seller_id: Uuid,
    pub ticket_number: String,
    pub cryptic_code: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub price: Decimal,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub generated_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Checks that `action` is allowed from the current status.
    ///
    /// valid -> used on scan, valid -> revoked on revoke, revoked -> valid on
    /// restore. `used` is final.
    pub fn check(&self, action: TicketAction) -> Result<TicketStatus, AppError> {
        match (action, self.status) {
            (TicketAction::Scan, TicketStatus::Used) => Err(AppError::TicketAlreadyUsed {
                used_at: self.used_at,
            }),
            (TicketAction::Scan, TicketStatus::Revoked) => Err(AppError::TicketRevoked),
            (action, status) if status == action.required_status() => Ok(action.target_status()),
            (action, status) => Err(AppError::InvalidTransition(format!(
                "cannot {} a {} ticket",
                action.verb(),
                status.as_str()
            ))),
        }
    }

    pub fn apply(&mut self, action: TicketAction, now: DateTime<Utc>) -> Result<(), AppError> {
        self.status = self.check(action)?;
        match action {
            TicketAction::Scan => self.used_at = Some(now),
            TicketAction::Revoke => self.revoked_at = Some(now),
            TicketAction::Restore => self.revoked_at = None,
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn qr_payload(&self) -> String {
        qr::encode(&self.cryptic_code)
    }

    pub fn display_code(&self) -> String {
        code::display(&self.cryptic_code)
    }
}

/// `BLT-000042` for the 42nd ticket of an event.
pub fn ticket_number(sequence: i32) -> String {
    format!("BLT-{sequence:06}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateTicketsRequest {
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl GenerateTicketsRequest {
    pub fn validate(self) -> Result<(Buyer, i32), AppError> {
        let quantity = self.quantity.unwrap_or(1);
        if !(1..=MAX_TICKETS_PER_REQUEST).contains(&quantity) {
            return Err(AppError::ValidationError(format!(
                "quantity must be between 1 and {MAX_TICKETS_PER_REQUEST}"
            )));
        }
        let buyer = Buyer {
            name: validate::required("buyer_name", &self.buyer_name)?,
            email: validate::email(&self.buyer_email)?,
            phone: validate::phone(self.buyer_phone.as_deref())?,
        };
        Ok((buyer, quantity))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub event_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub status: Option<TicketStatus>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.event_id.map_or(true, |id| ticket.event_id == id)
            && self.seller_id.map_or(true, |id| ticket.seller_id == id)
            && self.status.map_or(true, |s| ticket.status == s)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub code: String,
}

#[cfg(test)]
pub(crate) fn sample_ticket(status: TicketStatus) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: Uuid::new_v4(),
        event_id: Uuid::new_v4(),
        seller_id: Uuid::new_v4(),
        ticket_number: ticket_number(1),
        cryptic_code: code::generate(),
        buyer_name: "Ada Lovelace".to_string(),
        buyer_email: "ada@example.com".to_string(),
        buyer_phone: None,
        price: Decimal::new(2500, 2),
        status,
        generated_at: now,
        used_at: None,
        revoked_at: None,
        updated_at: now,
    }
}

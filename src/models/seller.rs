use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// A seller account bound to one event. `id` is the seller's account id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seller {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub quota: i32,
    pub tickets_sold: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seller {
    pub fn remaining(&self) -> i32 {
        (self.quota - self.tickets_sold).max(0)
    }

    pub fn ensure_can_issue(&self, count: i32) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::Forbidden(
                "Seller access has been revoked".to_string(),
            ));
        }
        if self.tickets_sold + count > self.quota {
            return Err(AppError::QuotaExceeded {
                quota: self.quota,
                tickets_sold: self.tickets_sold,
                requested: count,
            });
        }
        Ok(())
    }

    /// A quota may grow freely but never drop below tickets already sold.
    pub fn check_quota(&self, quota: i32) -> Result<i32, AppError> {
        if quota < 0 {
            return Err(AppError::ValidationError(
                "quota must not be negative".to_string(),
            ));
        }
        if quota < self.tickets_sold {
            return Err(AppError::ValidationError(format!(
                "quota cannot be lower than the {} tickets already sold",
                self.tickets_sold
            )));
        }
        Ok(quota)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSellerRequest {
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub quota: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateQuotaRequest {
    pub quota: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellerFilter {
    pub event_id: Option<Uuid>,
}

#[cfg(test)]
pub(crate) fn sample_seller(event_id: Uuid, quota: i32, sold: i32) -> Seller {
    let now = Utc::now();
    Seller {
        id: Uuid::new_v4(),
        event_id,
        name: "Sam Seller".to_string(),
        email: "sam@example.com".to_string(),
        quota,
        tickets_sold: sold,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_enforced() {
        let seller = sample_seller(Uuid::new_v4(), 5, 4);
        assert_eq!(seller.remaining(), 1);
        assert!(seller.ensure_can_issue(1).is_ok());
        assert!(matches!(
            seller.ensure_can_issue(2),
            Err(AppError::QuotaExceeded {
                quota: 5,
                tickets_sold: 4,
                requested: 2
            })
        ));
    }

    #[test]
    fn test_revoked_seller_cannot_issue() {
        let mut seller = sample_seller(Uuid::new_v4(), 5, 0);
        seller.is_active = false;
        assert!(matches!(
            seller.ensure_can_issue(1),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_quota_floor_is_tickets_sold() {
        let seller = sample_seller(Uuid::new_v4(), 5, 3);
        assert_eq!(seller.check_quota(3).unwrap(), 3);
        assert_eq!(seller.check_quota(50).unwrap(), 50);
        assert!(seller.check_quota(2).is_err());
        assert!(seller.check_quota(-1).is_err());
    }
}

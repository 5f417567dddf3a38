use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;
use crate::utils::validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub ticket_price: Decimal,
    pub is_active: bool,
    pub tickets_issued: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn remaining_capacity(&self) -> i32 {
        (self.capacity - self.tickets_issued).max(0)
    }

    /// Refuses `count` more tickets on an inactive or full event.
    pub fn ensure_can_issue(&self, count: i32) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::Forbidden(format!(
                "Event '{}' is not active",
                self.name
            )));
        }
        if self.tickets_issued + count > self.capacity {
            return Err(AppError::CapacityExceeded {
                capacity: self.capacity,
                tickets_issued: self.tickets_issued,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub ticket_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub ticket_price: Decimal,
}

impl CreateEventRequest {
    pub fn validate(self) -> Result<NewEvent, AppError> {
        Ok(NewEvent {
            name: validate::required("name", &self.name)?,
            description: validate::optional("description", self.description.as_deref())?,
            date: self.date,
            location: validate::required("location", &self.location)?,
            capacity: validate::non_negative("capacity", self.capacity)?,
            ticket_price: validate::price(self.ticket_price)?,
        })
    }
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub ticket_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl UpdateEventRequest {
    /// Applies the changes to `event`, checking each changed field.
    pub fn apply_to(self, event: &mut Event) -> Result<(), AppError> {
        if let Some(name) = self.name {
            event.name = validate::required("name", &name)?;
        }
        if let Some(description) = self.description {
            event.description = validate::optional("description", Some(&description))?;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(location) = self.location {
            event.location = validate::required("location", &location)?;
        }
        if let Some(capacity) = self.capacity {
            let capacity = validate::non_negative("capacity", capacity)?;
            if capacity < event.tickets_issued {
                return Err(AppError::ValidationError(format!(
                    "capacity cannot be lower than the {} tickets already issued",
                    event.tickets_issued
                )));
            }
            event.capacity = capacity;
        }
        if let Some(price) = self.ticket_price {
            event.ticket_price = validate::price(price)?;
        }
        if let Some(is_active) = self.is_active {
            event.is_active = is_active;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_event(capacity: i32) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        name: "Spring Gala".to_string(),
        description: None,
        date: now,
        location: "Main Hall".to_string(),
        capacity,
        ticket_price: Decimal::new(2500, 2),
        is_active: true,
        tickets_issued: 0,
        created_at: now,
        updated_at: now,
    }
}

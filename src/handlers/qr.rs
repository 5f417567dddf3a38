use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::handlers::tickets::TicketView;
use crate::handlers::visible_ticket;
use crate::models::ticket::ScanRequest;
use crate::models::{Event, Ticket, TicketAction, TicketStatus};
use crate::state::AppState;
use crate::tickets::qr;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiPath};
use crate::utils::response::success;

#[derive(Serialize)]
struct EventSummary {
    id: Uuid,
    name: String,
    date: DateTime<Utc>,
    location: String,
}

impl From<Event> for EventSummary {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            name: event.name,
            date: event.date,
            location: event.location,
        }
    }
}

#[derive(Serialize)]
struct ScanResult {
    result: &'static str,
    ticket: TicketView,
    event: EventSummary,
}

#[derive(Serialize)]
struct LookupResult {
    admissible: bool,
    ticket: TicketView,
    event: EventSummary,
}

#[derive(Serialize)]
struct QrPayload {
    ticket_id: Uuid,
    qr_payload: String,
    display_code: String,
}

/// Decodes the scanned value and finds the ticket among the admin's events.
async fn scanned_ticket(
    state: &AppState,
    admin: AdminUser,
    scanned: &str,
) -> Result<(Ticket, Event), AppError> {
    let code = qr::decode(scanned)?;
    let not_found = || AppError::NotFound("No ticket matches this code".to_string());

    let ticket = state
        .store
        .ticket_by_code(&code)
        .await?
        .ok_or_else(not_found)?;
    if state
        .store
        .admin_role(ticket.event_id, admin.id)
        .await?
        .is_none()
    {
        return Err(not_found());
    }
    let event = state
        .store
        .event(ticket.event_id)
        .await?
        .ok_or_else(not_found)?;
    Ok((ticket, event))
}

pub async fn verify(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(body): ApiJson<ScanRequest>,
) -> Result<Response, AppError> {
    let (ticket, event) = scanned_ticket(&state, admin, &body.code).await?;

    let ticket = match state
        .store
        .transition_ticket(ticket.id, TicketAction::Scan, Utc::now())
        .await
    {
        Ok(ticket) => ticket,
        Err(err) => {
            warn!(
                ticket_id = %ticket.id,
                event_id = %event.id,
                reason = err.code(),
                "Entry refused"
            );
            return Err(err);
        }
    };

    info!(ticket_id = %ticket.id, event_id = %event.id, by = %admin.id, "Entry admitted");
    Ok(success(
        ScanResult {
            result: "admitted",
            ticket: TicketView::new(ticket),
            event: event.into(),
        },
        "Ticket valid, entry admitted",
    ))
}

/// Same lookup as `verify` without consuming the ticket.
pub async fn lookup(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(body): ApiJson<ScanRequest>,
) -> Result<Response, AppError> {
    let (ticket, event) = scanned_ticket(&state, admin, &body.code).await?;
    Ok(success(
        LookupResult {
            admissible: ticket.status == TicketStatus::Valid,
            ticket: TicketView::new(ticket),
            event: event.into(),
        },
        "Ticket found",
    ))
}

pub async fn payload(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, user, ticket_id).await?;
    Ok(success(
        QrPayload {
            ticket_id: ticket.id,
            qr_payload: ticket.qr_payload(),
            display_code: ticket.display_code(),
        },
        "QR payload retrieved",
    ))
}

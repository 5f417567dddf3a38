//! Unauthenticated ticket pages reached through signed, time-boxed links.

use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::ticket::CURRENCY;
use crate::models::{Event, Ticket, TicketStatus};
use crate::state::AppState;
use crate::tickets::DownloadLink;
use crate::utils::error::AppError;
use crate::utils::extract::ApiPath;
use crate::utils::response::{attachment, success};

#[derive(Serialize)]
struct PublicEvent {
    name: String,
    date: DateTime<Utc>,
    location: String,
}

#[derive(Serialize)]
struct PublicTicketInfo {
    ticket_number: String,
    buyer_name: String,
    status: TicketStatus,
    price: Decimal,
    currency: &'static str,
    event: PublicEvent,
    link_expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct TicketDocument {
    ticket_number: String,
    code: String,
    qr_payload: String,
    buyer_name: String,
    price: Decimal,
    currency: &'static str,
    status: TicketStatus,
    generated_at: DateTime<Utc>,
    event: PublicEvent,
}

impl From<&Event> for PublicEvent {
    fn from(event: &Event) -> Self {
        Self {
            name: event.name.clone(),
            date: event.date,
            location: event.location.clone(),
        }
    }
}

async fn linked_ticket(
    state: &AppState,
    ticket_id: Uuid,
    token: &str,
) -> Result<(Ticket, Event, DownloadLink), AppError> {
    let link = DownloadLink::verify(ticket_id, token, Utc::now(), state.config.secret())?;
    let not_found = || AppError::NotFound("Ticket link not found".to_string());
    let ticket = state.store.ticket(ticket_id).await?.ok_or_else(not_found)?;
    let event = state
        .store
        .event(ticket.event_id)
        .await?
        .ok_or_else(not_found)?;
    Ok((ticket, event, link))
}

pub async fn ticket_info(
    State(state): State<AppState>,
    ApiPath((ticket_id, token)): ApiPath<(Uuid, String)>,
) -> Result<Response, AppError> {
    let (ticket, event, link) = linked_ticket(&state, ticket_id, &token).await?;
    let info = PublicTicketInfo {
        ticket_number: ticket.ticket_number,
        buyer_name: ticket.buyer_name,
        status: ticket.status,
        price: ticket.price,
        currency: CURRENCY,
        event: PublicEvent::from(&event),
        link_expires_at: link.expires_at,
    };
    Ok(success(info, "Ticket info retrieved"))
}

pub async fn download(
    State(state): State<AppState>,
    ApiPath((ticket_id, token)): ApiPath<(Uuid, String)>,
) -> Result<Response, AppError> {
    let (ticket, event, _) = linked_ticket(&state, ticket_id, &token).await?;
    if ticket.status == TicketStatus::Revoked {
        return Err(AppError::TicketRevoked);
    }

    tracing::info!(ticket_id = %ticket.id, "Ticket downloaded");
    let filename = format!("{}.json", ticket.ticket_number);
    let document = TicketDocument {
        code: ticket.display_code(),
        qr_payload: ticket.qr_payload(),
        ticket_number: ticket.ticket_number,
        buyer_name: ticket.buyer_name,
        price: ticket.price,
        currency: CURRENCY,
        status: ticket.status,
        generated_at: ticket.generated_at,
        event: PublicEvent::from(&event),
    };
    Ok(attachment(document, &filename))
}

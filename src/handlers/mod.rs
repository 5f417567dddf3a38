use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{AccountRole, AdminRole, Event, Seller, Ticket};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod admin;
pub mod auth;
pub mod events;
pub mod public;
pub mod qr;
pub mod sellers;
pub mod tickets;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
    store: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "billet-api",
        store: state.store.kind(),
    };

    success(payload, "Health check successful")
}

pub async fn route_not_found() -> AppError {
    AppError::NotFound("No route matches this path".to_string())
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

// Access helpers. An admin who does not administer an event gets the same
// NotFound as for a missing object.

pub(crate) async fn event_for_admin(
    state: &AppState,
    admin_id: Uuid,
    event_id: Uuid,
) -> Result<(Event, AdminRole), AppError> {
    let not_found = || AppError::NotFound(format!("Event {event_id} not found"));
    let role = state
        .store
        .admin_role(event_id, admin_id)
        .await?
        .ok_or_else(not_found)?;
    let event = state.store.event(event_id).await?.ok_or_else(not_found)?;
    Ok((event, role))
}

pub(crate) async fn admin_event_ids(state: &AppState, admin_id: Uuid) -> Result<Vec<Uuid>, AppError> {
    Ok(state
        .store
        .events_for_admin(admin_id)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect())
}

/// Explicit `event_id` narrows to that event; otherwise every event the admin
/// administers.
pub(crate) async fn admin_scope(
    state: &AppState,
    admin_id: Uuid,
    event_id: Option<Uuid>,
) -> Result<Vec<Uuid>, AppError> {
    match event_id {
        Some(event_id) => {
            event_for_admin(state, admin_id, event_id).await?;
            Ok(vec![event_id])
        }
        None => admin_event_ids(state, admin_id).await,
    }
}

pub(crate) async fn seller_for_admin(
    state: &AppState,
    admin_id: Uuid,
    seller_id: Uuid,
) -> Result<Seller, AppError> {
    let not_found = || AppError::NotFound(format!("Seller {seller_id} not found"));
    let seller = state.store.seller(seller_id).await?.ok_or_else(not_found)?;
    if state
        .store
        .admin_role(seller.event_id, admin_id)
        .await?
        .is_none()
    {
        return Err(not_found());
    }
    Ok(seller)
}

pub(crate) async fn ticket_for_admin(
    state: &AppState,
    admin_id: Uuid,
    ticket_id: Uuid,
) -> Result<Ticket, AppError> {
    let not_found = || AppError::NotFound(format!("Ticket {ticket_id} not found"));
    let ticket = state.store.ticket(ticket_id).await?.ok_or_else(not_found)?;
    if state
        .store
        .admin_role(ticket.event_id, admin_id)
        .await?
        .is_none()
    {
        return Err(not_found());
    }
    Ok(ticket)
}

/// Sellers see their own tickets; admins see tickets of their events.
pub(crate) async fn visible_ticket(
    state: &AppState,
    user: AuthUser,
    ticket_id: Uuid,
) -> Result<Ticket, AppError> {
    match user.role {
        AccountRole::Admin => ticket_for_admin(state, user.id, ticket_id).await,
        AccountRole::Seller => {
            let ticket = state
                .store
                .ticket(ticket_id)
                .await?
                .filter(|t| t.seller_id == user.id)
                .ok_or_else(|| AppError::NotFound(format!("Ticket {ticket_id} not found")))?;
            Ok(ticket)
        }
    }
}

use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser, SellerUser};
use crate::handlers::{admin_scope, ticket_for_admin, visible_ticket};
use crate::models::ticket::GenerateTicketsRequest;
use crate::models::{
    Event, Seller, SellerSummary, Ticket, TicketAction, TicketFilter, TicketStatus,
};
use crate::state::AppState;
use crate::tickets::TicketLinks;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, success};

/// A ticket as the API returns it.
#[derive(Debug, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub display_code: String,
    pub qr_payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<TicketLinks>,
}

impl TicketView {
    pub fn new(ticket: Ticket) -> Self {
        Self {
            display_code: ticket.display_code(),
            qr_payload: ticket.qr_payload(),
            ticket,
            links: None,
        }
    }

    pub fn with_links(ticket: Ticket, state: &AppState, now: DateTime<Utc>) -> Self {
        let links = state.ticket_links(ticket.id, now);
        Self {
            links: Some(links),
            ..Self::new(ticket)
        }
    }
}

#[derive(Serialize)]
struct SellerTickets {
    tickets: Vec<TicketView>,
    summary: SellerSummary,
}

#[derive(Serialize)]
struct SellerDashboard {
    seller: Seller,
    event: Option<Event>,
    summary: SellerSummary,
    recent: Vec<TicketView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<TicketStatus>,
}

const RECENT_TICKETS: usize = 5;

pub async fn generate(
    State(state): State<AppState>,
    SellerUser { seller }: SellerUser,
    ApiJson(body): ApiJson<GenerateTicketsRequest>,
) -> Result<Response, AppError> {
    let (buyer, quantity) = body.validate()?;
    let now = Utc::now();

    let tickets = state
        .store
        .issue_tickets(seller.id, &buyer, quantity, now)
        .await?;
    info!(
        seller_id = %seller.id,
        event_id = %seller.event_id,
        quantity,
        "Tickets generated"
    );

    let views: Vec<TicketView> = tickets
        .into_iter()
        .map(|t| TicketView::with_links(t, &state, now))
        .collect();
    Ok(created(views, "Tickets generated"))
}

async fn seller_tickets_all(state: &AppState, seller: &Seller) -> Result<Vec<Ticket>, AppError> {
    let filter = TicketFilter {
        seller_id: Some(seller.id),
        ..Default::default()
    };
    state.store.list_tickets(&[seller.event_id], &filter).await
}

pub async fn seller_tickets(
    State(state): State<AppState>,
    SellerUser { seller }: SellerUser,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Response, AppError> {
    let tickets = seller_tickets_all(&state, &seller).await?;
    let summary = SellerSummary::new(&seller, &tickets);
    let tickets = tickets
        .into_iter()
        .filter(|t| query.status.map_or(true, |s| t.status == s))
        .map(TicketView::new)
        .collect();
    Ok(success(SellerTickets { tickets, summary }, "Tickets retrieved"))
}

pub async fn seller_dashboard(
    State(state): State<AppState>,
    SellerUser { seller }: SellerUser,
) -> Result<Response, AppError> {
    let tickets = seller_tickets_all(&state, &seller).await?;
    let summary = SellerSummary::new(&seller, &tickets);
    let event = state.store.event(seller.event_id).await?;
    let recent = tickets
        .into_iter()
        .take(RECENT_TICKETS)
        .map(TicketView::new)
        .collect();
    Ok(success(
        SellerDashboard {
            seller,
            event,
            summary,
            recent,
        },
        "Dashboard retrieved",
    ))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, user, ticket_id).await?;
    Ok(success(TicketView::new(ticket), "Ticket retrieved"))
}

/// Issues a fresh pair of public links, e.g. after the previous ones expired.
pub async fn ticket_link(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, user, ticket_id).await?;
    if ticket.status == TicketStatus::Revoked {
        return Err(AppError::TicketRevoked);
    }
    let links = state.ticket_links(ticket.id, Utc::now());
    Ok(success(links, "Ticket link issued"))
}

pub async fn admin_tickets(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiQuery(filter): ApiQuery<TicketFilter>,
) -> Result<Response, AppError> {
    let scope = admin_scope(&state, admin.id, filter.event_id).await?;
    let tickets: Vec<TicketView> = state
        .store
        .list_tickets(&scope, &filter)
        .await?
        .into_iter()
        .map(TicketView::new)
        .collect();
    Ok(success(tickets, "Tickets retrieved"))
}

async fn transition(
    state: &AppState,
    admin: AdminUser,
    ticket_id: Uuid,
    action: TicketAction,
) -> Result<Ticket, AppError> {
    ticket_for_admin(state, admin.id, ticket_id).await?;
    let ticket = state
        .store
        .transition_ticket(ticket_id, action, Utc::now())
        .await?;
    info!(
        ticket_id = %ticket.id,
        status = ticket.status.as_str(),
        by = %admin.id,
        "Ticket status changed"
    );
    Ok(ticket)
}

pub async fn revoke_ticket(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = transition(&state, admin, ticket_id, TicketAction::Revoke).await?;
    Ok(success(TicketView::new(ticket), "Ticket revoked"))
}

pub async fn restore_ticket(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = transition(&state, admin, ticket_id, TicketAction::Restore).await?;
    Ok(success(TicketView::new(ticket), "Ticket restored"))
}

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{password, AdminUser};
use crate::handlers::event_for_admin;
use crate::models::account::AddAdminRequest;
use crate::models::event::{CreateEventRequest, UpdateEventRequest};
use crate::models::{AccountRole, AdminRole, Event, EventStats, NewAccount};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiPath};
use crate::utils::response::{created, empty_success, success};
use crate::utils::validate;

#[derive(Serialize)]
struct EventDetail {
    event: Event,
    role: AdminRole,
    stats: EventStats,
}

pub async fn list_events(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Response, AppError> {
    let events = state.store.events_for_admin(admin.id).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(body): ApiJson<CreateEventRequest>,
) -> Result<Response, AppError> {
    let new = body.validate()?;
    let event = state.store.create_event(new, admin.id).await?;
    info!(event_id = %event.id, owner = %admin.id, "Event created");
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let (event, role) = event_for_admin(&state, admin.id, event_id).await?;
    let totals = state.store.event_totals(&[event.id]).await?;
    let stats = EventStats::new(&event, totals.first().unwrap_or(&Default::default()));
    Ok(success(EventDetail { event, role, stats }, "Event retrieved"))
}

pub async fn update_event(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateEventRequest>,
) -> Result<Response, AppError> {
    event_for_admin(&state, admin.id, event_id).await?;
    let event = state.store.update_event(event_id, body).await?;
    info!(event_id = %event.id, by = %admin.id, "Event updated");
    Ok(success(event, "Event updated"))
}

pub async fn list_admins(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    event_for_admin(&state, admin.id, event_id).await?;
    let admins = state.store.event_admins(event_id).await?;
    Ok(success(admins, "Event admins retrieved"))
}

async fn require_owner(state: &AppState, admin: AdminUser, event_id: Uuid) -> Result<(), AppError> {
    let (_, role) = event_for_admin(state, admin.id, event_id).await?;
    if role != AdminRole::Owner {
        return Err(AppError::Forbidden(
            "Only the event owner can manage admins".to_string(),
        ));
    }
    Ok(())
}

pub async fn add_admin(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AddAdminRequest>,
) -> Result<Response, AppError> {
    require_owner(&state, admin, event_id).await?;

    let email = validate::email(&body.email)?;
    let member = match state.store.account_by_email(&email).await? {
        Some(account) if account.role == AccountRole::Admin => {
            state.store.add_event_admin(event_id, account.id).await?
        }
        Some(_) => {
            return Err(AppError::Conflict(format!(
                "'{email}' belongs to a seller account"
            )))
        }
        None => {
            let password = body.password.as_deref().ok_or_else(|| {
                AppError::ValidationError(
                    "password is required for a new admin account".to_string(),
                )
            })?;
            let account = NewAccount {
                name: validate::required("name", &body.name)?,
                email,
                password_hash: password::hash(validate::password(password)?)?,
                role: AccountRole::Admin,
            };
            state.store.create_event_admin(event_id, account).await?
        }
    };

    info!(event_id = %event_id, account_id = %member.account_id, "Event admin added");
    Ok(created(member, "Admin added to event"))
}

pub async fn remove_admin(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath((event_id, account_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    require_owner(&state, admin, event_id).await?;
    state.store.remove_event_admin(event_id, account_id).await?;
    info!(event_id = %event_id, account_id = %account_id, "Event admin removed");
    Ok(empty_success("Admin removed from event"))
}

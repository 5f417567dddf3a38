use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{password, AdminUser};
use crate::handlers::{admin_scope, event_for_admin, seller_for_admin};
use crate::models::seller::{CreateSellerRequest, SellerFilter, UpdateQuotaRequest};
use crate::models::{AccountRole, NewAccount, Seller, SellerSummary, TicketFilter};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, success};
use crate::utils::validate;

#[derive(Serialize)]
struct SellerDetail {
    seller: Seller,
    summary: SellerSummary,
}

pub async fn list_sellers(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiQuery(filter): ApiQuery<SellerFilter>,
) -> Result<Response, AppError> {
    let scope = admin_scope(&state, admin.id, filter.event_id).await?;
    let sellers = state.store.sellers_for_events(&scope).await?;
    Ok(success(sellers, "Sellers retrieved"))
}

pub async fn create_seller(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(body): ApiJson<CreateSellerRequest>,
) -> Result<Response, AppError> {
    event_for_admin(&state, admin.id, body.event_id).await?;

    let account = NewAccount {
        name: validate::required("name", &body.name)?,
        email: validate::email(&body.email)?,
        password_hash: password::hash(validate::password(&body.password)?)?,
        role: AccountRole::Seller,
    };
    let quota = validate::non_negative("quota", body.quota)?;

    let seller = state
        .store
        .create_seller(account, body.event_id, quota)
        .await?;
    info!(seller_id = %seller.id, event_id = %seller.event_id, quota, "Seller created");
    Ok(created(seller, "Seller created"))
}

pub async fn get_seller(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(seller_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let seller = seller_for_admin(&state, admin.id, seller_id).await?;
    let filter = TicketFilter {
        seller_id: Some(seller.id),
        ..Default::default()
    };
    let tickets = state
        .store
        .list_tickets(&[seller.event_id], &filter)
        .await?;
    let summary = SellerSummary::new(&seller, &tickets);
    Ok(success(SellerDetail { seller, summary }, "Seller retrieved"))
}

pub async fn update_quota(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(seller_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateQuotaRequest>,
) -> Result<Response, AppError> {
    seller_for_admin(&state, admin.id, seller_id).await?;
    let seller = state
        .store
        .update_seller_quota(seller_id, body.quota)
        .await?;
    info!(seller_id = %seller.id, quota = seller.quota, by = %admin.id, "Seller quota updated");
    Ok(success(seller, "Seller quota updated"))
}

pub async fn revoke_seller(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(seller_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    seller_for_admin(&state, admin.id, seller_id).await?;
    let seller = state.store.set_seller_active(seller_id, false).await?;
    info!(seller_id = %seller.id, by = %admin.id, "Seller access revoked");
    Ok(success(seller, "Seller access revoked"))
}

pub async fn restore_seller(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(seller_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    seller_for_admin(&state, admin.id, seller_id).await?;
    let seller = state.store.set_seller_active(seller_id, true).await?;
    info!(seller_id = %seller.id, by = %admin.id, "Seller access restored");
    Ok(success(seller, "Seller access restored"))
}

use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::password;
use crate::auth::token::{TokenKind, TokenPair};
use crate::auth::AuthUser;
use crate::models::{Account, AccountRole, Event, Seller};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
struct SessionPayload {
    #[serde(flatten)]
    tokens: TokenPair,
    user: Account,
}

#[derive(Serialize)]
struct ProfilePayload {
    user: Account,
    #[serde(skip_serializing_if = "Option::is_none")]
    seller: Option<Seller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<Event>,
}

fn session(state: &AppState, account: Account) -> Result<SessionPayload, AppError> {
    let config = &state.config;
    let tokens = state.signer().issue_pair(
        account.id,
        account.role,
        Utc::now(),
        config.access_token_ttl,
        config.refresh_token_ttl,
    )?;
    Ok(SessionPayload {
        tokens,
        user: account,
    })
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let invalid = || AppError::AuthError("Invalid email or password".to_string());
    let email = body.email.trim().to_lowercase();

    let Some(account) = state.store.account_by_email(&email).await? else {
        password::verify_dummy(&body.password);
        return Err(invalid());
    };
    if !password::verify(&body.password, &account.password_hash) {
        warn!(account_id = %account.id, "Failed login attempt");
        return Err(invalid());
    }

    info!(account_id = %account.id, role = account.role.as_str(), "Login");
    Ok(success(session(&state, account)?, "Login successful"))
}

pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Result<Response, AppError> {
    let claims = state
        .signer()
        .verify(&body.refresh_token, TokenKind::Refresh, Utc::now())?;
    let account = state
        .store
        .account_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;

    Ok(success(session(&state, account)?, "Token refreshed"))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Response, AppError> {
    let account = state
        .store
        .account_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;

    let (seller, event) = match account.role {
        AccountRole::Admin => (None, None),
        AccountRole::Seller => {
            let seller = state.store.seller(account.id).await?;
            let event = match &seller {
                Some(s) => state.store.event(s.event_id).await?,
                None => None,
            };
            (seller, event)
        }
    };

    Ok(success(
        ProfilePayload {
            user: account,
            seller,
            event,
        },
        "Profile retrieved",
    ))
}

//! Bearer-token authentication and the extractors handlers use to require it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{AccountRole, Seller};
use crate::state::AppState;
use crate::utils::error::AppError;

pub mod password;
pub mod token;

use token::TokenKind;

/// Any caller with a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: AccountRole,
}

/// An authenticated admin account.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser {
    pub id: Uuid,
}

/// An authenticated seller, loaded from the store.
#[derive(Debug, Clone)]
pub struct SellerUser {
    pub seller: Seller,
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| AppError::AuthError("Malformed authorization header".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::AuthError("Malformed authorization header".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::AuthError(
            "Malformed authorization header".to_string(),
        ));
    }
    Ok(token.trim())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let claims = state
            .signer()
            .verify(token, TokenKind::Access, Utc::now())?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != AccountRole::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser { id: user.id })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SellerUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != AccountRole::Seller {
            return Err(AppError::Forbidden("Seller access required".to_string()));
        }
        let seller = state
            .store
            .seller(user.id)
            .await?
            .ok_or_else(|| AppError::AuthError("Seller account no longer exists".to_string()))?;
        Ok(SellerUser { seller })
    }
}

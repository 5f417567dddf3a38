//! Signed bearer tokens: `v1.<base64url(json claims)>.<base64url(hmac)>`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::models::AccountRole;
use crate::utils::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const MAX_TOKEN_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: AccountRole,
    pub kind: TokenKind,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

pub struct TokenSigner<'a> {
    secret: &'a [u8],
}

impl<'a> TokenSigner<'a> {
    pub fn new(secret: &'a [u8]) -> Self {
        Self { secret }
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, AppError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AppError::InternalServerError(format!("encode claims: {e}")))?;
        let payload_part = URL_SAFE_NO_PAD.encode(payload);
        let sig = self.mac(&payload_part).finalize().into_bytes();
        Ok(format!(
            "{TOKEN_VERSION}.{payload_part}.{}",
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    pub fn issue_pair(
        &self,
        sub: Uuid,
        role: AccountRole,
        now: DateTime<Utc>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<TokenPair, AppError> {
        let access = Claims {
            sub,
            role,
            kind: TokenKind::Access,
            exp: (now + access_ttl).timestamp(),
        };
        let refresh = Claims {
            sub,
            role,
            kind: TokenKind::Refresh,
            exp: (now + refresh_ttl).timestamp(),
        };
        Ok(TokenPair {
            access_token: self.issue(&access)?,
            refresh_token: self.issue(&refresh)?,
            token_type: "Bearer",
            expires_in: access_ttl.num_seconds(),
        })
    }

    /// Checks signature, kind and expiry. Every failure is an `AuthError`.
    pub fn verify(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, AppError> {
        let invalid = || AppError::AuthError("Invalid or expired token".to_string());

        if token.len() > MAX_TOKEN_LEN {
            return Err(invalid());
        }
        let mut parts = token.split('.');
        let (Some(TOKEN_VERSION), Some(payload_part), Some(sig_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let sig = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| invalid())?;
        self.mac(payload_part)
            .verify_slice(&sig)
            .map_err(|_| invalid())?;

        let payload = URL_SAFE_NO_PAD.decode(payload_part).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;

        if claims.kind != expected || claims.exp <= now.timestamp() {
            return Err(invalid());
        }
        Ok(claims)
    }

    fn mac(&self, payload_part: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.secret).expect("HMAC accepts any key length");
        mac.update(b"billet-token:");
        mac.update(payload_part.as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(signer: &TokenSigner<'_>, now: DateTime<Utc>) -> TokenPair {
        signer
            .issue_pair(
                Uuid::new_v4(),
                AccountRole::Seller,
                now,
                Duration::minutes(15),
                Duration::days(7),
            )
            .unwrap()
    }

    #[test]
    fn test_access_token_verifies() {
        let signer = TokenSigner::new(b"secret");
        let now = Utc::now();
        let tokens = pair(&signer, now);
        let claims = signer
            .verify(&tokens.access_token, TokenKind::Access, now)
            .unwrap();
        assert_eq!(claims.role, AccountRole::Seller);
        assert_eq!(tokens.expires_in, 900);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let signer = TokenSigner::new(b"secret");
        let now = Utc::now();
        let tokens = pair(&signer, now);
        assert!(signer
            .verify(&tokens.refresh_token, TokenKind::Access, now)
            .is_err());
        assert!(signer
            .verify(&tokens.access_token, TokenKind::Refresh, now)
            .is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = TokenSigner::new(b"secret");
        let now = Utc::now();
        let tokens = pair(&signer, now);
        let later = now + Duration::minutes(16);
        assert!(signer
            .verify(&tokens.access_token, TokenKind::Access, later)
            .is_err());
        assert!(signer
            .verify(&tokens.refresh_token, TokenKind::Refresh, later)
            .is_ok());
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let signer = TokenSigner::new(b"secret");
        let now = Utc::now();
        let tokens = pair(&signer, now);
        let parts: Vec<&str> = tokens.access_token.split('.').collect();
        let forged_claims = Claims {
            sub: Uuid::new_v4(),
            role: AccountRole::Admin,
            kind: TokenKind::Access,
            exp: now.timestamp() + 3600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(signer.verify(&forged, TokenKind::Access, now).is_err());
        assert!(TokenSigner::new(b"other")
            .verify(&tokens.access_token, TokenKind::Access, now)
            .is_err());
    }
}

//! Time-boxed public ticket links.
//!
//! The token is `<expires_unix>.<base64url(hmac)>`. Nothing is stored server
//! side: a link is valid while its signature matches and it has not expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::utils::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const MAX_TOKEN_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DownloadLink {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TicketLinks {
    pub info_url: String,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}

impl DownloadLink {
    pub fn issue(ticket_id: Uuid, now: DateTime<Utc>, ttl: Duration, secret: &[u8]) -> Self {
        let expires_at = now + ttl;
        let exp = expires_at.timestamp();
        let sig = URL_SAFE_NO_PAD.encode(sign(ticket_id, exp, secret).finalize().into_bytes());
        Self {
            token: format!("{exp}.{sig}"),
            // second precision, same as the token
            expires_at: Utc.timestamp_opt(exp, 0).single().unwrap_or(expires_at),
        }
    }

    /// Unknown or tampered tokens are `NotFound`; a genuine but stale token
    /// is `LinkExpired`.
    pub fn verify(
        ticket_id: Uuid,
        token: &str,
        now: DateTime<Utc>,
        secret: &[u8],
    ) -> Result<Self, AppError> {
        let not_found = || AppError::NotFound("Ticket link not found".to_string());

        if token.len() > MAX_TOKEN_LEN {
            return Err(not_found());
        }
        let (exp_part, sig_part) = token.split_once('.').ok_or_else(not_found)?;
        let exp: i64 = exp_part.parse().map_err(|_| not_found())?;
        let sig = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| not_found())?;

        sign(ticket_id, exp, secret)
            .verify_slice(&sig)
            .map_err(|_| not_found())?;

        let expires_at = Utc.timestamp_opt(exp, 0).single().ok_or_else(not_found)?;
        if expires_at <= now {
            return Err(AppError::LinkExpired);
        }
        Ok(Self {
            token: token.to_string(),
            expires_at,
        })
    }

    pub fn urls(&self, base_url: &str, ticket_id: Uuid) -> TicketLinks {
        let base = base_url.trim_end_matches('/');
        TicketLinks {
            info_url: format!("{base}/api/public/ticket/{ticket_id}/{}/info", self.token),
            download_url: format!("{base}/api/public/download/{ticket_id}/{}", self.token),
            expires_at: self.expires_at,
        }
    }
}

fn sign(ticket_id: Uuid, exp: i64, secret: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(b"ticket-link:");
    mac.update(ticket_id.as_bytes());
    mac.update(b":");
    mac.update(exp.to_string().as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_fresh_link_verifies() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let link = DownloadLink::issue(id, now, Duration::hours(1), SECRET);
        let checked = DownloadLink::verify(id, &link.token, now, SECRET).unwrap();
        assert_eq!(checked.expires_at, link.expires_at);
    }

    #[test]
    fn test_expired_link_is_gone() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let link = DownloadLink::issue(id, now, Duration::minutes(5), SECRET);
        let later = now + Duration::minutes(6);
        assert!(matches!(
            DownloadLink::verify(id, &link.token, later, SECRET),
            Err(AppError::LinkExpired)
        ));
    }

    #[test]
    fn test_link_is_bound_to_ticket_and_secret() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let link = DownloadLink::issue(id, now, Duration::hours(1), SECRET);
        assert!(matches!(
            DownloadLink::verify(Uuid::new_v4(), &link.token, now, SECRET),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            DownloadLink::verify(id, &link.token, now, b"other"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_extending_expiry_breaks_signature() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let link = DownloadLink::issue(id, now, Duration::hours(1), SECRET);
        let (_, sig) = link.token.split_once('.').unwrap();
        let forged = format!("{}.{sig}", link.expires_at.timestamp() + 86_400);
        assert!(matches!(
            DownloadLink::verify(id, &forged, now, SECRET),
            Err(AppError::NotFound(_))
        ));
        assert!(DownloadLink::verify(id, "garbage", now, SECRET).is_err());
    }

    #[test]
    fn test_urls_use_base() {
        let id = Uuid::new_v4();
        let link = DownloadLink::issue(id, Utc::now(), Duration::hours(1), SECRET);
        let urls = link.urls("https://billet.example/", id);
        assert_eq!(
            urls.download_url,
            format!("https://billet.example/api/public/download/{id}/{}", link.token)
        );
        assert!(urls.info_url.ends_with("/info"));
    }
}

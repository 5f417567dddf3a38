//! Text payload carried by ticket QR codes.

use thiserror::Error;

use crate::tickets::code::{self, CodeError};
use crate::utils::error::AppError;

pub const PREFIX: &str = "BILLET";
pub const VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrError {
    #[error("scanned value is empty")]
    Empty,
    #[error("unknown QR payload prefix '{0}'")]
    Prefix(String),
    #[error("unsupported QR payload version '{0}'")]
    Version(String),
    #[error(transparent)]
    Code(#[from] CodeError),
}

impl From<QrError> for AppError {
    fn from(err: QrError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// `BILLET:1:<code>`
pub fn encode(code: &str) -> String {
    format!("{PREFIX}:{VERSION}:{code}")
}

/// Accepts a full payload, a bare code (grouped or not), or a URL whose last
/// path segment is either of those. Returns the normalized code.
pub fn decode(scanned: &str) -> Result<String, QrError> {
    let mut value = scanned.trim();
    if value.is_empty() {
        return Err(QrError::Empty);
    }

    if value.contains("://") {
        value = value
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        value = value.split(['?', '#']).next().unwrap_or_default();
    }

    let mut parts = value.splitn(3, ':');
    let (first, second, third) = (parts.next(), parts.next(), parts.next());
    match (first, second, third) {
        (Some(bare), None, None) => Ok(code::validate(bare)?),
        (Some(prefix), Some(version), Some(code_part)) => {
            if !prefix.eq_ignore_ascii_case(PREFIX) {
                return Err(QrError::Prefix(prefix.to_string()));
            }
            if version.parse::<u32>().ok() != Some(VERSION) {
                return Err(QrError::Version(version.to_string()));
            }
            Ok(code::validate(code_part)?)
        }
        (Some(prefix), _, _) => Err(QrError::Prefix(prefix.to_string())),
        (None, _, _) => Err(QrError::Empty),
    }
}

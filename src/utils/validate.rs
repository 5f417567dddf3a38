use rust_decimal::Decimal;

use crate::utils::error::AppError;

const MAX_TEXT_LEN: usize = 200;
const MIN_PASSWORD_LEN: usize = 8;

/// Trims `value` and rejects empty or overlong input.
pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::ValidationError(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text collapses to `None`.
pub fn optional(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v).map(Some),
    }
}

/// Lowercased, trimmed email with one `@` and a dotted domain.
pub fn email(value: &str) -> Result<String, AppError> {
    let email = required("email", value)?.to_lowercase();
    let invalid = || AppError::ValidationError(format!("'{email}' is not a valid email"));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(email)
}

/// Phone numbers keep a leading `+` and digits; separators are dropped.
pub fn phone(value: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        match c {
            '+' if i == 0 => out.push(c),
            '0'..='9' => out.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(AppError::ValidationError(format!(
                    "'{raw}' is not a valid phone number"
                )))
            }
        }
    }

    let digits = out.trim_start_matches('+').len();
    if !(7..=15).contains(&digits) {
        return Err(AppError::ValidationError(format!(
            "'{raw}' is not a valid phone number"
        )));
    }
    Ok(Some(out))
}

pub fn password(value: &str) -> Result<&str, AppError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(value)
}

/// Prices are NSL amounts with at most two decimals.
pub fn price(value: Decimal) -> Result<Decimal, AppError> {
    if value.is_sign_negative() {
        return Err(AppError::ValidationError(
            "ticket_price must not be negative".to_string(),
        ));
    }
    if value.normalize().scale() > 2 {
        return Err(AppError::ValidationError(
            "ticket_price must have at most two decimals".to_string(),
        ));
    }
    let mut price = value;
    price.rescale(2);
    Ok(price)
}

pub fn non_negative(field: &str, value: i32) -> Result<i32, AppError> {
    if value < 0 {
        return Err(AppError::ValidationError(format!(
            "{field} must not be negative"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("name", "  Ada ").unwrap(), "Ada");
        assert!(required("name", "   ").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(email("ada.example.com").is_err());
        assert!(email("ada@localhost").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("a@b@example.com").is_err());
    }

    #[test]
    fn test_phone_strips_separators() {
        assert_eq!(
            phone(Some("+33 (6) 12-34-56-78")).unwrap().as_deref(),
            Some("+33612345678")
        );
        assert_eq!(phone(Some("  ")).unwrap(), None);
        assert!(phone(Some("12345")).is_err());
        assert!(phone(Some("06x1234567")).is_err());
    }

    #[test]
    fn test_price_rescales_to_cents() {
        let p = price(Decimal::new(25, 0)).unwrap();
        assert_eq!(p.to_string(), "25.00");
        assert!(price(Decimal::new(-1, 0)).is_err());
        assert!(price(Decimal::new(12345, 3)).is_err());
    }
}

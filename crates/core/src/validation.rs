//! Input validation shared by the domain crates.
//!
//! Everything here runs before any store access; a failure is always a
//! `DomainError::Validation`.

use crate::error::{DomainError, DomainResult};

/// Trim and collapse inner runs of whitespace to a single space.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reject blank input.
pub fn require_not_blank(value: &str, field: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Enforce an inclusive character-count range.
pub fn require_len(value: &str, field: &str, min: usize, max: usize) -> DomainResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(DomainError::validation(format!(
            "{field} is too short (minimum {min} characters)"
        )));
    }
    if len > max {
        return Err(DomainError::validation(format!(
            "{field} is too long (maximum {max} characters)"
        )));
    }
    Ok(())
}

/// Normalize then validate a display name: not blank, within `max` characters.
pub fn display_name(raw: &str, field: &str, max: usize) -> DomainResult<String> {
    require_not_blank(raw, field)?;
    let name = normalize_name(raw);
    require_len(&name, field, 1, max)?;
    Ok(name)
}

/// True for `http://` or `https://` URLs with something after the scheme.
pub fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(r) if !r.is_empty())
}

/// Enforce `min <= value <= max` for a numeric field.
pub fn require_range(value: i64, min: i64, max: i64, field: &str) -> DomainResult<()> {
    if value < min || value > max {
        return Err(DomainError::validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

//! Shared validation helpers for values that end up in HTTP requests

use crate::error::{KioskError, Result};

fn invalid(message: String) -> KioskError {
    KioskError::InvalidConfig { message }
}

/// Sanitize a string value for safe use in HTTP headers
///
/// Rejects control characters, DEL, null bytes and line breaks.
pub fn sanitize_for_header(value: &str, field_name: &str) -> Result<String> {
    if value.is_empty() {
        return Err(invalid(format!("{} cannot be empty", field_name)));
    }

    for (index, ch) in value.char_indices() {
        if ch.is_control() || ch == '\u{7f}' {
            return Err(invalid(format!(
                "{} contains invalid character at position {} ({:?}). \
                Control characters, newlines, carriage returns, and null bytes are not allowed.",
                field_name, index, ch
            )));
        }
    }

    Ok(value.to_string())
}

/// Validate an API key can be used in both the `apikey` and `Authorization` headers
pub fn validate_api_key(api_key: &str) -> Result<String> {
    let trimmed = api_key.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Err(invalid("API key is empty or set to 'none'".to_string()));
    }

    sanitize_for_header(trimmed, "API key")?;

    let header_value = format!("Bearer {}", trimmed);
    header_value
        .parse::<reqwest::header::HeaderValue>()
        .map_err(|_| {
            invalid(format!(
                "API key results in invalid Authorization header. Key length: {} characters.",
                trimmed.len()
            ))
        })?;

    Ok(trimmed.to_string())
}

/// Sanitize a base URL for API requests
///
/// Returns the URL trimmed and without trailing slashes, so paths can be
/// appended with a single `/`.
pub fn sanitize_base_url(url: &str, field_name: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');

    if trimmed.is_empty() {
        return Err(invalid(format!("{} cannot be empty", field_name)));
    }

    // Encoded separators usually mean the value was pasted double-encoded
    if trimmed.contains("%2F") || trimmed.contains("%3D") || trimmed.contains("%20") {
        return Err(invalid(format!(
            "{} appears to contain URL-encoded characters (e.g., %2F, %3D, %20)",
            field_name
        )));
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(invalid(format!(
            "{} must start with 'http://' or 'https://'. Got: {}",
            field_name, trimmed
        )));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_header_valid() {
        assert!(sanitize_for_header("abc123", "test").is_ok());
        assert!(sanitize_for_header("eyJhbGciOiJIUzI1NiJ9.e30.sig", "test").is_ok());
    }

    #[test]
    fn test_sanitize_for_header_invalid() {
        assert!(sanitize_for_header("abc\n123", "test").is_err());
        assert!(sanitize_for_header("abc\r123", "test").is_err());
        assert!(sanitize_for_header("abc\x00123", "test").is_err());
        assert!(sanitize_for_header("abc\x7f123", "test").is_err());
    }

    #[test]
    fn test_validate_api_key() {
        assert_eq!(validate_api_key("  anon-key ").unwrap(), "anon-key");
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("NONE").is_err());
        assert!(validate_api_key(" \n ").is_err());
    }

    #[test]
    fn test_sanitize_base_url() {
        assert_eq!(
            sanitize_base_url("https://project.supabase.co/", "url").unwrap(),
            "https://project.supabase.co"
        );
        assert!(sanitize_base_url("http://localhost:54321", "url").is_ok());
    }

    #[test]
    fn test_sanitize_base_url_invalid() {
        assert!(sanitize_base_url("", "url").is_err());
        assert!(sanitize_base_url("project.supabase.co", "url").is_err());
        assert!(sanitize_base_url("https://example%2Fcom", "url").is_err());
    }
}

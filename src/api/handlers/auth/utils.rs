//! Small helpers for auth input validation.

use regex::Regex;
use std::net::IpAddr;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Client IP claimed by proxy headers: the first `x-forwarded-for` hop, then
/// `x-real-ip`. Values that are not IP addresses are ignored.
pub(crate) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    };
    header("x-forwarded-for").or_else(|| header("x-real-ip"))
}

/// Trim a required text field, rejecting blanks.
pub(crate) fn required_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Seconds as the signed integer Postgres interval arithmetic expects.
pub(crate) fn seconds_i64(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Allowed.EDU "), "alice@allowed.edu");
    }

    #[test]
    fn valid_email_checks_shape() {
        assert!(valid_email("a@allowed.edu"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("two words@allowed.edu"));
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), "1.2.3.4".parse().ok());
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), "9.9.9.9".parse().ok());
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn required_text_rejects_blank() {
        assert_eq!(required_text("  hi "), Some("hi".to_string()));
        assert_eq!(required_text("   "), None);
    }

    #[test]
    fn seconds_saturate() {
        assert_eq!(seconds_i64(600), 600);
        assert_eq!(seconds_i64(u64::MAX), i64::MAX);
    }
}

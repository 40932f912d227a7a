//! Normalization applied before any comparison: domains lowercased with
//! scheme/path/query and leading `www.` stripped; emails lowercased; phone
//! numbers reduced to digits and required to have 10-11 digits.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Normalizes a raw domain or URL to a bare lowercase host.
///
/// Returns `None` when nothing host-like can be extracted.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Accept full URLs as well as bare domains.
    let host = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?.host_str()?.to_string()
    } else {
        // Strip any path/query the caller left on a bare domain.
        let bare = trimmed
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(trimmed)
            .to_string();
        bare
    };

    let mut host = host.to_lowercase();
    if let Some(stripped) = host.strip_prefix("www.") {
        host = stripped.to_string();
    }

    // A host must have at least one dot and no spaces to be usable.
    if host.is_empty() || !host.contains('.') || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host)
}

/// Lowercases and trims an email for comparison. No validity check here.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Reduces a phone number to digits only; `None` unless 10-11 digits
/// remain (anything else is not a plausible number).
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if (10..=11).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // RFC 5322 simplified: local@domain.tld
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("static email regex")
    })
}

/// Validate an email address before trusting a provider-supplied value.
///
/// Checks for:
/// - basic format (contains @ and ., minimum length)
/// - fake/placeholder patterns (repeated digits like 9999, 1111)
/// - valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // Placeholder values some vendors return instead of nothing.
    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    for pattern in &fake_patterns {
        if email.contains(pattern) {
            tracing::warn!("Rejecting email with fake pattern '{}': {}", pattern, email);
            return false;
        }
    }

    if !email_regex().is_match(email) {
        tracing::warn!("Rejecting malformed email: {}", email);
        return false;
    }

    true
}

/// Adapter helper: vendor empty strings and garbage emails become `None`
/// so absence stays distinct from an explicit empty value.
pub fn clean_email(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || !is_valid_email(value) {
        return None;
    }
    Some(normalize_email(value))
}

/// Adapter helper: trims and drops vendor empty strings.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_scheme_path_and_www() {
        assert_eq!(
            normalize_domain("https://www.Acme.com/team?ref=x").as_deref(),
            Some("acme.com")
        );
        assert_eq!(normalize_domain("ACME.COM/about").as_deref(), Some("acme.com"));
        assert_eq!(normalize_domain("www.acme.co.uk").as_deref(), Some("acme.co.uk"));
        assert_eq!(normalize_domain("acme.com").as_deref(), Some("acme.com"));
    }

    #[test]
    fn domain_rejects_hostless_input() {
        assert_eq!(normalize_domain(""), None);
        assert_eq!(normalize_domain("   "), None);
        assert_eq!(normalize_domain("not a domain"), None);
        assert_eq!(normalize_domain("localhost"), None);
    }

    #[test]
    fn phone_digits_only_10_or_11() {
        assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("1-555-123-4567").as_deref(), Some("15551234567"));
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("+44 20 7946 0958 ext 12345"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn email_validation_accepts_real_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.co.uk"));
        assert!(is_valid_email("user+tag@example.io"));
    }

    #[test]
    fn email_validation_rejects_fakes_and_garbage() {
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("1199999999333@gmail.com"));
        assert!(!is_valid_email("test123456789@example.com"));
        assert!(!is_valid_email("user @example.com"));
    }

    #[test]
    fn clean_email_drops_empty_and_invalid() {
        assert_eq!(clean_email(None), None);
        assert_eq!(clean_email(Some("")), None);
        assert_eq!(clean_email(Some("   ")), None);
        assert_eq!(clean_email(Some("bad")), None);
        assert_eq!(
            clean_email(Some("  Jane@Acme.COM ")).as_deref(),
            Some("jane@acme.com")
        );
    }
}

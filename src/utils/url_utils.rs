//! URL validation utilities.

/// Check if a URL is a plausible fetch target: non-empty, http(s) scheme,
/// and not one of the non-network pseudo-schemes (`data:`, `javascript:`,
/// `mailto:`).
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(is_valid_url("https://example.com/page"));
        assert!(is_valid_url("http://example.com"));
    }

    #[test]
    fn rejects_non_network_schemes() {
        assert!(!is_valid_url("data:text/plain;base64,SGVsbG8="));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("mailto:a@b.com"));
    }

    #[test]
    fn rejects_empty_and_hostless() {
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("file:///etc/passwd"));
    }
}

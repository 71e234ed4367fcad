//! Endpoint URL helpers.

/// Normalize one configured endpoint.
///
/// Surrounding whitespace and trailing slashes are removed and `http://` is
/// prepended when the entry has no scheme. Returns `None` for blank entries.
pub fn normalize_endpoint(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    if has_scheme(trimmed) {
        Some(trimmed.to_string())
    } else {
        Some(format!("http://{trimmed}"))
    }
}

/// Normalize a list of endpoints, preserving order and dropping duplicates.
pub fn normalize_endpoints<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for entry in raw {
        if let Some(endpoint) = normalize_endpoint(entry.as_ref())
            && !out.contains(&endpoint)
        {
            out.push(endpoint);
        }
    }
    out
}

/// Split a comma-separated endpoint string and normalize each entry.
pub fn parse_endpoint_list(raw: &str) -> Vec<String> {
    normalize_endpoints(raw.split(','))
}

/// Default display name for a miner that has never been named.
///
/// `http://10.0.0.5/` becomes `bitaxe_10.0.0.5`.
pub fn derive_name(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    format!("bitaxe_{}", without_scheme.trim_end_matches('/'))
}

/// Validate that a normalized endpoint is an absolute http(s) URL with a host.
pub fn validate_endpoint(endpoint: &str) -> Result<(), String> {
    let parsed = url::Url::parse(endpoint).map_err(|e| format!("{endpoint}: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("{endpoint}: unsupported scheme '{}'", parsed.scheme()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("{endpoint}: missing host"));
    }
    Ok(())
}

fn has_scheme(s: &str) -> bool {
    let Some(idx) = s.find("://") else {
        return false;
    };
    let scheme = &s[..idx];
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_scheme_when_missing() {
        assert_eq!(
            normalize_endpoint("  192.168.1.50 "),
            Some("http://192.168.1.50".to_string())
        );
    }

    #[test]
    fn keeps_existing_scheme() {
        assert_eq!(
            normalize_endpoint("https://miner.lan/"),
            Some("https://miner.lan".to_string())
        );
    }

    #[test]
    fn drops_blank_entries() {
        assert_eq!(normalize_endpoint("   "), None);
        assert_eq!(
            parse_endpoint_list("10.0.0.1, ,http://10.0.0.2,,10.0.0.1"),
            vec!["http://10.0.0.1".to_string(), "http://10.0.0.2".to_string()]
        );
    }

    #[test]
    fn derive_name_strips_scheme_and_slash() {
        assert_eq!(derive_name("http://10.0.0.5/"), "bitaxe_10.0.0.5");
        assert_eq!(derive_name("https://miner.lan:8080"), "bitaxe_miner.lan:8080");
        assert_eq!(derive_name("10.0.0.9"), "bitaxe_10.0.0.9");
    }

    #[test]
    fn derive_name_is_deterministic() {
        assert_eq!(derive_name("http://a"), derive_name("http://a"));
    }

    #[test]
    fn validates_endpoints() {
        assert!(validate_endpoint("http://10.0.0.1").is_ok());
        assert!(validate_endpoint("ftp://10.0.0.1").is_err());
        assert!(validate_endpoint("http://").is_err());
    }
}

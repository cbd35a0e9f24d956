//! String heuristics used when classifying dynamic agent inputs.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

#[allow(clippy::expect_used)]
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{12}$",
    )
    .expect("uuid pattern is valid")
});

/// Whether `value` is a UUID, with or without hyphens.
pub fn is_uuid_string(value: &str) -> bool {
    UUID_RE.is_match(value)
}

/// Whether `value` parses as an absolute `http` or `https` URL.
pub fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Whether `value` reads like a filesystem path rather than free text:
/// it contains a path separator or starts with a dot.
pub fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\') || value.starts_with('.')
}

//! Response-to-error mapping
//!
//! Turns a non-2xx response into the domain [`ApiError`], including the
//! `Retry-After` hint for rate-limited responses.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, RETRY_AFTER};
use roe_domain::ApiError;

/// Build the typed error for a non-2xx response.
///
/// The request id is read from `request_id_header` when one is configured.
pub fn api_error_from_response(
    status: u16,
    body: &[u8],
    headers: &HeaderMap,
    request_id_header: Option<&HeaderName>,
) -> ApiError {
    let request_id = request_id_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    ApiError::from_parts(status, body, request_id, parse_retry_after(headers))
}

/// Parse `Retry-After` as delta seconds or an HTTP-date.
///
/// Returns `None` when the header is absent, empty or unparseable. Dates in
/// the past and negative deltas yield zero.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(Duration::from_secs(u64::try_from(secs).unwrap_or(0)));
    }

    let at = parse_http_date(raw)?;
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// IMF-fixdate, RFC 850 and asctime forms.
fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use roe_domain::ApiErrorKind;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn rate_limit_keeps_integer_retry_after() {
        let err = api_error_from_response(429, b"", &headers(&[("retry-after", "7")]), None);
        assert_eq!(err.kind(), ApiErrorKind::RateLimit);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn unparseable_retry_after_is_absent() {
        let err = api_error_from_response(429, b"", &headers(&[("retry-after", "soon")]), None);
        assert_eq!(err.retry_after(), None);

        let err = api_error_from_response(429, b"", &HeaderMap::new(), None);
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn http_date_retry_after_counts_down() {
        let at = Utc::now() + chrono::Duration::seconds(120);
        let value = at.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let hint = parse_retry_after(&headers(&[("retry-after", &value)])).unwrap();
        assert!(hint > Duration::from_secs(100) && hint <= Duration::from_secs(120));

        let past = headers(&[("retry-after", "Sun, 06 Nov 1994 08:49:37 GMT")]);
        assert_eq!(parse_retry_after(&past), Some(Duration::ZERO));

        let asctime = headers(&[("retry-after", "Sun Nov  6 08:49:37 1994")]);
        assert_eq!(parse_retry_after(&asctime), Some(Duration::ZERO));
    }

    #[test]
    fn server_errors_ignore_retry_after_but_keep_request_id() {
        let name = HeaderName::from_static("x-request-id");
        let err = api_error_from_response(
            503,
            br#"{"detail":"maintenance"}"#,
            &headers(&[("retry-after", "3"), ("x-request-id", "req-9")]),
            Some(&name),
        );
        assert_eq!(err.kind(), ApiErrorKind::Server);
        assert_eq!(err.retry_after(), None);
        assert_eq!(err.to_string(), "api error (503): maintenance (request_id=req-9)");
    }
}

//! API-key authentication headers.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use roe_domain::constants::USER_AGENT as SDK_USER_AGENT;
use roe_domain::{Result, RoeError};

/// `Authorization` and `User-Agent` values attached to every request.
#[derive(Clone)]
pub struct AuthHeaders {
    authorization: HeaderValue,
    user_agent: HeaderValue,
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders").field("user_agent", &self.user_agent).finish_non_exhaustive()
    }
}

impl AuthHeaders {
    /// A key that already starts with `Bearer ` (any case) is not prefixed
    /// twice.
    ///
    /// # Errors
    /// Returns [`RoeError::Config`] if the key cannot be sent as a header.
    pub fn new(api_key: &str) -> Result<Self> {
        let token = strip_bearer(api_key.trim());
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| RoeError::Config("API key contains invalid header characters".into()))?;
        authorization.set_sensitive(true);

        Ok(Self { authorization, user_agent: HeaderValue::from_static(SDK_USER_AGENT) })
    }

    /// Append both headers to `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.append(AUTHORIZATION, self.authorization.clone());
        headers.append(USER_AGENT, self.user_agent.clone());
    }
}

fn strip_bearer(key: &str) -> &str {
    const PREFIX: &str = "bearer ";
    match key.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => key[PREFIX.len()..].trim(),
        _ => key,
    }
}

//! Client-side request identifiers.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;

/// Prefix shared by every generated request id.
pub const REQUEST_ID_PREFIX: &str = "roe-";

const REQUEST_ID_BYTES: usize = 16;

/// Generate a request id of the form `roe-<32 hex chars>`.
///
/// Randomness comes from the OS generator. If it is unavailable the id falls
/// back to `roe-<unix nanoseconds>`, which is unique enough for log
/// correlation but not unpredictable.
pub fn generate_request_id() -> String {
    let mut bytes = [0u8; REQUEST_ID_BYTES];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => format!("{REQUEST_ID_PREFIX}{}", hex::encode(bytes)),
        Err(_) => {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or_default();
            format!("{REQUEST_ID_PREFIX}{nanos}")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn has_prefix_and_hex_body() {
        let id = generate_request_id();
        let body = id.strip_prefix(REQUEST_ID_PREFIX).unwrap();
        assert_eq!(body.len(), REQUEST_ID_BYTES * 2);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_request_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}

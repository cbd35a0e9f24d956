use serde::{Deserialize, Serialize};

use super::null_as_default;

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { count: 0, next: None, previous: None, results: Vec::new() }
    }
}

impl<T> Page<T> {
    /// Whether the server reported a next page.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Whether the server reported a previous page.
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

use serde::{Deserialize, Serialize};

// Default limit for pagination
const DEFAULT_PAGE_LIMIT: u64 = 25;
// Max limit to prevent excessive requests
const MAX_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    offset: u64,
}

impl PaginationParams {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    pub fn limit(&self) -> u64 {
        if self.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.limit.min(MAX_PAGE_LIMIT).max(1)
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Filters applied by the public browse listings. `query` is a literal
/// case-insensitive substring match against titles; it carries no wildcard
/// syntax.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

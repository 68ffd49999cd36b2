//! Listing pages
//!
//! The listing endpoint returns `{count, results, current_page?, has_next?,
//! total_pages?}`. Older deployments omit the pagination fields or return the
//! records under `data` or as a bare array, so pages are parsed from a raw
//! JSON value with defaults filled in.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size the listing endpoint honours
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination metadata of one listing response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Authoritative total number of records on the server
    pub count: u64,
    /// Index of this page (1-based)
    pub current_page: u32,
    /// Total number of pages
    pub total_pages: u32,
    /// Whether another page follows this one
    pub has_next: bool,
}

impl PageInfo {
    /// Metadata for a single, complete page of `count` records
    pub fn single(count: u64) -> Self {
        Self {
            count,
            current_page: 1,
            total_pages: 1,
            has_next: false,
        }
    }
}

/// One page of listing results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub info: PageInfo,
}

impl<T: DeserializeOwned> Page<T> {
    /// Parse a listing response for `requested_page`
    ///
    /// Missing metadata defaults to: the requested page index, no next page,
    /// and `ceil(count / page_size)` total pages (at least one).
    pub fn from_value(
        value: Value,
        requested_page: u32,
        page_size: u32,
    ) -> Result<Self, serde_json::Error> {
        let (results, object) = match value {
            Value::Array(items) => (Value::Array(items), None),
            Value::Object(mut map) => {
                let results = map
                    .remove("results")
                    .or_else(|| map.remove("data"))
                    .unwrap_or_else(|| Value::Array(Vec::new()));
                (results, Some(map))
            }
            other => (other, None),
        };

        let results: Vec<T> = serde_json::from_value(results)?;
        let len = results.len() as u64;

        let field_u64 = |name: &str| {
            object
                .as_ref()
                .and_then(|m| m.get(name))
                .and_then(Value::as_u64)
        };

        let count = field_u64("count").unwrap_or(len);
        let current_page = field_u64("current_page")
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(requested_page);
        let has_next = object
            .as_ref()
            .and_then(|m| m.get("has_next"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let total_pages = field_u64("total_pages")
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or_else(|| {
                let size = u64::from(page_size.max(1));
                u32::try_from(count.div_ceil(size).max(1)).unwrap_or(u32::MAX)
            });

        Ok(Self {
            results,
            info: PageInfo {
                count,
                current_page,
                total_pages,
                has_next,
            },
        })
    }
}

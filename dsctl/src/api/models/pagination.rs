//! Shared pagination types for API query parameters.
//!
//! List endpoints use page-based pagination with `page` and `limit` parameters and answer with
//! a `{data, pagination}` envelope.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 20;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Standard pagination parameters for list endpoints.
///
/// - `page`: 1-based page number (default: 1)
/// - `limit`: Maximum items to return (default: 20, max: 100)
///
/// Values are clamped rather than rejected, so `page=0` reads the first page and `limit=500`
/// reads 100 rows. Non-numeric values are rejected by the query extractor.
#[serde_as]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Page number, starting at 1 (default: 1)
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Maximum number of items to return (default: 20, max: 100)
    #[param(default = 20, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Get the page number, never below 1.
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    /// Defaults to DEFAULT_LIMIT if not specified.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Rows to skip for the current page.
    #[inline]
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Pagination metadata returned alongside every list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Total number of items matching the query (before pagination)
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub limit: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PageInfo {
    pub fn new(total: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        let current_page = pagination.page();
        let total_pages = if total <= 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            total,
            total_pages,
            current_page,
            limit,
            has_next_page: current_page < total_pages,
            has_previous_page: current_page > 1,
        }
    }
}

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            pagination: PageInfo::new(total, pagination),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), DEFAULT_LIMIT);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let p = Pagination::new(0, 0);
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 1);

        let p = Pagination::new(-3, 5000);
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(2, 10).offset(), 10);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }

    #[test]
    fn test_page_info_for_partial_last_page() {
        let info = PageInfo::new(25, &Pagination::new(2, 10));
        assert_eq!(info.total_pages, 3);
        assert_eq!(info.current_page, 2);
        assert!(info.has_next_page);
        assert!(info.has_previous_page);

        let last = PageInfo::new(25, &Pagination::new(3, 10));
        assert!(!last.has_next_page);
    }

    #[test]
    fn test_page_info_empty() {
        let info = PageInfo::new(0, &Pagination::default());
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next_page);
        assert!(!info.has_previous_page);
    }

    #[test]
    fn test_deserialize_from_query_strings() {
        #[derive(Deserialize)]
        struct Query {
            #[serde(flatten)]
            pagination: Pagination,
            search: Option<String>,
        }

        let q: Query = serde_urlencoded_from("page=2&limit=10&search=abc");
        assert_eq!(q.pagination.page(), 2);
        assert_eq!(q.pagination.limit(), 10);
        assert_eq!(q.search.as_deref(), Some("abc"));

        let q: Query = serde_urlencoded_from("");
        assert_eq!(q.pagination.page(), 1);
    }

    fn serde_urlencoded_from<T: serde::de::DeserializeOwned>(query: &str) -> T {
        let uri: axum::http::Uri = format!("/items?{query}").parse().unwrap();
        axum::extract::Query::<T>::try_from_uri(&uri).unwrap().0
    }
}

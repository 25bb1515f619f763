//! Offset pagination utilities.

use serde::{Deserialize, Serialize};

/// Default page size when none is supplied.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u32 = 100;

/// A normalized page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Builds a page request, clamping out-of-range values.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl PageInfo {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let per_page = i64::from(request.per_page);
        let total_pages = if total <= 0 {
            0
        } else {
            ((total + per_page - 1) / per_page) as u32
        };
        Self {
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, DEFAULT_PER_PAGE);
        assert_eq!(req.offset(), 0);
        assert_eq!(req.limit(), 20);
    }

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(1000));
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, MAX_PER_PAGE);

        let req = PageRequest::new(Some(3), Some(0));
        assert_eq!(req.per_page, 1);
        assert_eq!(req.offset(), 2);
    }

    #[test]
    fn test_page_request_offset() {
        let req = PageRequest::new(Some(3), Some(25));
        assert_eq!(req.offset(), 50);
        assert_eq!(req.limit(), 25);
    }

    #[test]
    fn test_page_info_total_pages() {
        let req = PageRequest::new(Some(1), Some(10));
        assert_eq!(PageInfo::new(req, 0).total_pages, 0);
        assert_eq!(PageInfo::new(req, 10).total_pages, 1);
        assert_eq!(PageInfo::new(req, 11).total_pages, 2);
    }

    #[test]
    fn test_page_info_serializes_camel_case() {
        let info = PageInfo::new(PageRequest::default(), 5);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["perPage"], 20);
        assert_eq!(json["totalPages"], 1);
    }
}

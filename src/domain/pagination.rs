//! Page-based pagination shared by list operations

use serde::Serialize;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// A 1-indexed page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Missing or zero values fall back to the defaults; limit is capped
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);

        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals needed to render pagination
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            limit: request.limit(),
        }
    }

    /// ceil(total / limit)
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = PageRequest::default();

        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), 20);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_zero_values_fall_back() {
        let request = PageRequest::new(Some(0), Some(0));

        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), 20);
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(PageRequest::new(None, Some(5000)).limit(), MAX_LIMIT);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(Some(2), Some(10)).offset(), 10);
        assert_eq!(PageRequest::new(Some(3), Some(5)).offset(), 10);
    }

    #[test]
    fn test_pages_is_ceiling() {
        let request = PageRequest::new(Some(1), Some(20));

        assert_eq!(Page::<u8>::new(vec![], 0, request).pages(), 0);
        assert_eq!(Page::<u8>::new(vec![], 20, request).pages(), 1);
        assert_eq!(Page::<u8>::new(vec![], 21, request).pages(), 2);
    }

    #[test]
    fn test_map_keeps_totals() {
        let page = Page::new(vec![1, 2], 7, PageRequest::new(Some(2), Some(2)));
        let mapped = page.map(|n| n * 10);

        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total, 7);
        assert_eq!(mapped.page, 2);
        assert_eq!(mapped.pages(), 4);
    }
}

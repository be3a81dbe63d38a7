use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::pagination::{Page, PageRequest};

/// `?page=&limit=` query string; unparseable values count as absent
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default, deserialize_with = "leading_number")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "leading_number")]
    pub limit: Option<u32>,
}

/// Leading ASCII digits as a number, like `parseInt`
fn leading_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;

    Ok(raw.and_then(|value| {
        let digits: String = value
            .trim()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }))
}

impl From<PageQuery> for PageRequest {
    fn from(query: PageQuery) -> Self {
        PageRequest::new(query.page, query.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationResponse {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl<T> From<&Page<T>> for PaginationResponse {
    fn from(page: &Page<T>) -> Self {
        Self {
            total: page.total,
            page: page.page,
            limit: page.limit,
            pages: page.pages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_from_page() {
        let page: Page<u8> = Page::new(vec![1, 2], 45, PageRequest::new(Some(3), Some(20)));
        let pagination = PaginationResponse::from(&page);

        assert_eq!(pagination.total, 45);
        assert_eq!(pagination.page, 3);
        assert_eq!(pagination.pages, 3);
    }

    #[test]
    fn test_query_defaults() {
        let request = PageRequest::from(PageQuery::default());
        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), 20);
    }
}

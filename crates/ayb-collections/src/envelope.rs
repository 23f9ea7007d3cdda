//! The paged response envelope (§4.4.3).

use ayb_db::Pagination;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct PageEnvelope {
    pub items: Vec<Value>,
    pub page: u32,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(rename = "totalItems")]
    pub total_items: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl PageEnvelope {
    #[must_use]
    pub fn new(items: Vec<Value>, pagination: Pagination, total_items: u64) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total_items,
            total_pages: pagination.total_pages(total_items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_matches_ceiling_division() {
        let pagination = Pagination::clamp(Some(1), Some(20));
        let envelope = PageEnvelope::new(vec![], pagination, 41);
        assert_eq!(envelope.total_pages, 3);
        assert!(envelope.items.len() as u32 <= envelope.per_page);
    }
}

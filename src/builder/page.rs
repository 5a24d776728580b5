//! Page requests and paged results.

use serde::Serialize;

use super::output::QueryOutput;
use crate::config::PaginationSettings;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Pagination {
    /// Clamp `page` to at least 1 and the page size to `[1, max_page_size]`.
    pub fn new(page: u64, page_size: Option<u64>, settings: &PaginationSettings) -> Self {
        let max = settings.max_page_size.max(1);
        Self {
            page: page.max(1),
            page_size: page_size.unwrap_or(settings.default_page_size).clamp(1, max),
        }
    }

    /// Number of roots before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// One page of hydrated roots. `total_items` counts distinct roots, not rows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<'a> {
    pub items: QueryOutput<'a>,
    pub total_items: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl<'a> Page<'a> {
    pub fn new(items: QueryOutput<'a>, total_items: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total_items,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: total_items.div_ceil(pagination.page_size.max(1)),
        }
    }
}

//! # Pagination Planner
//!
//! Resolves the effective page size for a forum listing and derives the
//! offset and page count from it. Page-size caps are the caller's policy and
//! are not enforced here.

use serde::Serialize;

/// Where a listing page starts and how many pages exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub offset: u64,
}

impl PageWindow {
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    /// An offset past the end is a valid, empty page.
    pub fn is_past_end(&self) -> bool {
        self.offset >= self.total_items
    }
}

/// Computes a `PageWindow`.
///
/// Page size resolution, first usable value wins: the caller's request, then
/// the forum's override, then the board default. Zero or negative sizes count
/// as "not provided". A missing or non-positive page means page 1.
///
/// `global_default` must be positive; the configuration layer guarantees it
/// and a zero here is clamped to 1 rather than dividing by zero.
pub fn plan(
    global_default: u32,
    forum_override: Option<u32>,
    caller_size: Option<i64>,
    total_items: u64,
    requested_page: Option<i64>,
) -> PageWindow {
    let caller_size = caller_size
        .filter(|size| *size > 0)
        .map(|size| u32::try_from(size).unwrap_or(u32::MAX));
    let forum_override = forum_override.filter(|size| *size > 0);
    let page_size = caller_size
        .or(forum_override)
        .unwrap_or(global_default)
        .max(1);

    let page = requested_page
        .filter(|page| *page > 0)
        .map(|page| u32::try_from(page).unwrap_or(u32::MAX))
        .unwrap_or(1);

    let size = u64::from(page_size);
    PageWindow {
        page,
        page_size,
        total_items,
        total_pages: total_items.div_ceil(size),
        offset: u64::from(page - 1) * size,
    }
}

//! Pagination - page counts, windowed page lists and page slices
//!
//! One implementation shared by every paginated list (records, jobs,
//! quotes, expenses, listings).

use serde::Serialize;

/// Page lists longer than this are windowed
const FULL_LIST_LIMIT: usize = 10;

/// Pages shown either side of the current page in a windowed list
const WINDOW_RADIUS: usize = 2;

/// Number of pages needed for `total` items. `size == 0` is treated as 1.
pub fn page_count(total: usize, size: usize) -> usize {
    let size = size.max(1);
    total.div_ceil(size)
}

/// Visible page numbers for a pager.
///
/// Every page when there are at most ten; otherwise the first page, the last
/// page and two pages either side of `current`, sorted and deduplicated.
pub fn page_list(current: usize, total_pages: usize) -> Vec<usize> {
    if total_pages <= FULL_LIST_LIMIT {
        return (1..=total_pages).collect();
    }

    let current = current.clamp(1, total_pages);
    let low = current.saturating_sub(WINDOW_RADIUS).max(1);
    let high = (current + WINDOW_RADIUS).min(total_pages);

    let mut pages: Vec<usize> = std::iter::once(1)
        .chain(low..=high)
        .chain(std::iter::once(total_pages))
        .collect();
    pages.sort_unstable();
    pages.dedup();
    pages
}

/// Clamp a requested (1-based) page into range
pub fn clamp_page(requested: usize, total_pages: usize) -> usize {
    requested.clamp(1, total_pages.max(1))
}

/// One page of results with pager metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub current: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
    pub page_list: Vec<usize>,
}

impl<T> Page<T> {
    /// Slice `items` to the requested page
    pub fn paginate(items: Vec<T>, requested: usize, size: usize) -> Self {
        let size = size.max(1);
        let total_items = items.len();
        let total_pages = page_count(total_items, size);
        let current = clamp_page(requested, total_pages);
        let start = (current - 1) * size;

        let items: Vec<T> = items.into_iter().skip(start).take(size).collect();

        Self {
            items,
            current,
            total_pages,
            total_items,
            page_size: size,
            page_list: page_list(current, total_pages),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }
}

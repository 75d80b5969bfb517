//! Pagination utilities for result row listings

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub page_size: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// The page is clamped to `[1, total_pages]` and the page size to
/// `[1, MAX_PAGE_SIZE]`.
///
/// # Examples
/// ```
/// use ecp_api::pagination::calculate_pagination;
///
/// // 250 rows at 100 per page = 3 pages
/// let p = calculate_pagination(250, 2, Some(100));
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
///
/// // Requesting an out-of-bounds page gets clamped
/// let p = calculate_pagination(250, 99, Some(100));
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: Option<i64>) -> Pagination {
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        offset,
    }
}

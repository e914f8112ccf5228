//! Page cursor shared by the paginated tables.

/// Maximum number of page buttons shown at once.
pub const PAGE_WINDOW: u32 = 10;

/// Page cursor over a listing of `total` items.
///
/// Pages are 1-based. `total_pages` is never below 1 so the cursor always
/// points at a valid page, even for an empty listing.
///
/// ```
/// use slowquery_console::data::Pager;
///
/// let mut pager = Pager::new(20);
/// pager.set_total(95);
/// assert_eq!(pager.total_pages(), 5);
/// pager.last();
/// assert_eq!(pager.page(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: u32,
    page_size: u32,
    total: u64,
}

impl Pager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// `ceil(total / page_size)`, at least 1.
    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(self.page_size as u64);
        pages.clamp(1, u32::MAX as u64) as u32
    }

    /// Update the item count, keeping the page in range.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.page = self.page.min(self.total_pages());
    }

    /// Jump to `page`, clamped to `1..=total_pages`. Returns whether the
    /// page changed.
    pub fn go_to(&mut self, page: u32) -> bool {
        let page = page.clamp(1, self.total_pages());
        let changed = page != self.page;
        self.page = page;
        changed
    }

    pub fn first(&mut self) -> bool {
        self.go_to(1)
    }

    pub fn prev(&mut self) -> bool {
        self.go_to(self.page.saturating_sub(1))
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.page.saturating_add(1))
    }

    pub fn last(&mut self) -> bool {
        self.go_to(self.total_pages())
    }

    /// Back to page 1, e.g. after the filter changed.
    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Page numbers to display: at most [`PAGE_WINDOW`] of them, starting
    /// four before the current page and shifted left to stay full near the
    /// end.
    pub fn window(&self) -> Vec<u32> {
        let total_pages = self.total_pages();
        let width = total_pages.min(PAGE_WINDOW);
        let mut start = self.page.saturating_sub(4).max(1);
        let end = (start + width - 1).min(total_pages);
        if end - start + 1 < width {
            start = (end + 1).saturating_sub(width).max(1);
        }
        (start..=end).collect()
    }

    /// Items of the current page for client-side paging.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page as usize - 1).saturating_mul(self.page_size as usize);
        if start >= items.len() {
            return &[];
        }
        let end = (start + self.page_size as usize).min(items.len());
        &items[start..end]
    }

    /// 1-based index range of the current page, e.g. `(21, 40)`.
    pub fn item_range(&self) -> (u64, u64) {
        if self.total == 0 {
            return (0, 0);
        }
        let start = (self.page as u64 - 1) * self.page_size as u64 + 1;
        let end = (start + self.page_size as u64 - 1).min(self.total);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager(page_size: u32, total: u64, page: u32) -> Pager {
        let mut pager = Pager::new(page_size);
        pager.set_total(total);
        pager.go_to(page);
        pager
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(pager(20, 41, 1).total_pages(), 3);
        assert_eq!(pager(20, 40, 1).total_pages(), 2);
        assert_eq!(pager(20, 0, 1).total_pages(), 1);
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut p = pager(20, 41, 1);
        assert!(!p.prev());
        assert_eq!(p.page(), 1);
        assert!(p.next());
        assert!(p.next());
        assert!(!p.next());
        assert_eq!(p.page(), 3);
        assert!(p.first());
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn test_shrinking_total_pulls_page_back() {
        let mut p = pager(20, 200, 10);
        p.set_total(30);
        assert_eq!(p.page(), 2);
    }

    #[test]
    fn test_window_starts_four_before_current() {
        assert_eq!(pager(10, 1000, 1).window(), (1..=10).collect::<Vec<_>>());
        assert_eq!(pager(10, 1000, 8).window(), (4..=13).collect::<Vec<_>>());
    }

    #[test]
    fn test_window_shifts_left_near_the_end() {
        // 25 pages, on page 24: start would be 20 but only 6 pages remain.
        assert_eq!(pager(10, 250, 24).window(), (16..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_window_with_few_pages() {
        assert_eq!(pager(15, 40, 3).window(), vec![1, 2, 3]);
        assert_eq!(pager(15, 0, 1).window(), vec![1]);
    }

    #[test]
    fn test_slice_for_client_side_paging() {
        let items: Vec<u32> = (1..=40).collect();
        let p = pager(15, items.len() as u64, 3);
        assert_eq!(p.slice(&items), &items[30..40]);
        assert_eq!(p.item_range(), (31, 40));
    }
}

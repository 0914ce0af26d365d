/// Default number of pages shown on each side of the current page.
pub const DEFAULT_PAGE_SIBLINGS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    /// Stands in for one or more hidden pages.
    Ellipsis,
}

/// Page number one step back, never below 1.
pub fn previous_page(current: u32) -> u32 {
    current.saturating_sub(1).max(1)
}

/// Page number one step forward, never past `last_page`.
pub fn next_page(current: u32, last_page: u32) -> u32 {
    current.saturating_add(1).min(last_page.max(1))
}

pub fn clamp_page(page: u32, last_page: u32) -> u32 {
    page.clamp(1, last_page.max(1))
}

/// Buttons for a pager: the first page, the last page and every page within
/// `siblings` of `current`. Each run of hidden pages collapses into one ellipsis.
pub fn page_buttons(total_pages: u32, current: u32, siblings: u32) -> Vec<PageItem> {
    let total = total_pages.max(1);
    let current = clamp_page(current, total);
    let low = current.saturating_sub(siblings).max(2);
    let high = current.saturating_add(siblings).min(total - 1);

    let mut items = vec![PageItem::Page(1)];
    if low <= high {
        if low > 2 {
            items.push(PageItem::Ellipsis);
        }
        items.extend((low..=high).map(PageItem::Page));
        if high < total - 1 {
            items.push(PageItem::Ellipsis);
        }
    } else if total > 2 {
        // Window sits entirely on the first or last page.
        items.push(PageItem::Ellipsis);
    }
    if total > 1 {
        items.push(PageItem::Page(total));
    }
    items
}

/// 1-based positions of the first and last task on the page, plus the overall total.
/// `first` is 0 when the page holds no tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSummary {
    pub first: u64,
    pub last: u64,
    pub total: u64,
}

impl RangeSummary {
    pub fn new(page: u32, limit: u32, shown: usize, total: u64) -> Self {
        let page = u64::from(page.max(1));
        let limit = u64::from(limit);
        let first = if shown > 0 { (page - 1) * limit + 1 } else { 0 };
        let last = (page * limit).min(total);
        Self { first, last, total }
    }
}

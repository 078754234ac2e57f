//! Page-based read model helpers
//!
//! Provides the page/page-size coercion and window envelope shared by all
//! paginated listings. The window query and the count query behind a page are
//! independent; a page assembled while writers are active carries no
//! shared-snapshot guarantee between `items` and `total_count`.

use serde::Serialize;

/// First page when no page is supplied.
pub const DEFAULT_PAGE: u64 = 1;
/// Window size when no page size is supplied.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// A coerced page request. Construction never fails: junk or non-positive
/// input falls back to the defaults instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Build a request from already-numeric values; zero falls back to the default.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: if page == 0 { DEFAULT_PAGE } else { page },
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
        }
    }

    /// Coerce raw query-string values ("2", "25") into a request.
    pub fn from_query(page: Option<&str>, page_size: Option<&str>) -> Self {
        Self {
            page: parse_positive(page).unwrap_or(DEFAULT_PAGE),
            page_size: parse_positive(page_size).unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of items to skip before the window starts.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Number of items the window holds.
    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|value| *value > 0)
}

/// One window of a listing plus the hints a client needs to walk it.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
}

impl<T> Page<T> {
    /// Assemble a page from a fetched window and an independently computed
    /// total. A previous page exists whenever items were skipped; a next page
    /// whenever the window ends before the total does.
    pub fn assemble(items: Vec<T>, total_count: u64, request: &PageRequest) -> Self {
        let offset = request.offset();
        Self {
            items,
            total_count,
            page_size: request.page_size(),
            previous_page: (offset > 0).then(|| request.page() - 1),
            next_page: (offset.saturating_add(request.page_size()) < total_count)
                .then(|| request.page() + 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_size: self.page_size,
            previous_page: self.previous_page,
            next_page: self.next_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_supplied() {
        let request = PageRequest::from_query(None, None);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn junk_input_falls_back_to_defaults() {
        let request = PageRequest::from_query(Some("abc"), Some("-3"));
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);

        let request = PageRequest::from_query(Some("0"), Some("0"));
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);
    }

    #[test]
    fn numeric_input_is_used() {
        let request = PageRequest::from_query(Some("3"), Some("25"));
        assert_eq!(request.page(), 3);
        assert_eq!(request.page_size(), 25);
        assert_eq!(request.offset(), 50);
    }

    #[test]
    fn middle_page_has_both_hints() {
        // 25 items, window of 10: page 2 covers items 11-20
        let request = PageRequest::new(2, 10);
        let page = Page::assemble(vec![0; 10], 25, &request);
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(page.next_page, Some(3));
    }

    #[test]
    fn last_page_has_no_next_hint() {
        // 25 items, window of 10: page 3 covers items 21-25
        let request = PageRequest::new(3, 10);
        let page = Page::assemble(vec![0; 5], 25, &request);
        assert_eq!(page.previous_page, Some(2));
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn first_page_has_no_previous_hint() {
        let request = PageRequest::new(1, 10);
        let page = Page::assemble(vec![0; 10], 25, &request);
        assert_eq!(page.previous_page, None);
        assert_eq!(page.next_page, Some(2));
    }

    #[test]
    fn exact_fit_has_no_next_hint() {
        let request = PageRequest::new(2, 10);
        let page = Page::assemble(vec![0; 10], 20, &request);
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn absent_hints_are_not_serialized() {
        let request = PageRequest::new(1, 10);
        let page = Page::assemble(vec![1, 2, 3], 3, &request);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("previous_page").is_none());
        assert!(json.get("next_page").is_none());
        assert_eq!(json["total_count"], 3);
        assert_eq!(json["page_size"], 10);
    }

    #[test]
    fn map_preserves_hints() {
        let request = PageRequest::new(2, 2);
        let page = Page::assemble(vec![1, 2], 6, &request).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(page.next_page, Some(3));
    }
}

use serde::{Deserialize, Serialize};

/// One page of a page-number paginated listing.
///
/// `total_items` comes from a separate count query and may reflect a
/// different instant than `items` when writes happen between the two.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// 1-based page number.
    pub current_page: u64,
    pub page_size: u64,
    /// Rows matching the filter across all pages.
    pub total_items: u64,
    pub items: Vec<T>,
}

impl<T> PagedResult<T> {
    pub fn new(current_page: u64, page_size: u64, total_items: u64, items: Vec<T>) -> Self {
        Self {
            current_page,
            page_size,
            total_items,
            items,
        }
    }

    /// Number of pages needed to cover `total_items`; zero for an empty set.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.page_size)
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map items while keeping page metadata (model -> DTO convenience).
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            current_page: self.current_page,
            page_size: self.page_size,
            total_items: self.total_items,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

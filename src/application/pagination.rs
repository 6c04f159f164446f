//! Page-number pagination over ordered feeds.
//!
//! Page indices are 1-based. Out-of-range requests clamp to the nearest
//! valid page instead of erroring, and an empty feed still yields exactly
//! one (empty) page.

use std::num::NonZeroU32;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Fixed-size slicer for an ordered sequence of `total_items` items.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: NonZeroU32,
}

/// The resolved window a repository fetches with `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Clamped 1-based page number.
    pub number: u32,
    pub offset: u64,
    pub limit: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

/// One page of a feed plus the metadata templates need for navigation.
#[derive(Debug, Clone)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> FeedPage<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    /// Count of items on this page.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

impl Paginator {
    pub fn new(page_size: NonZeroU32) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    /// ceil(total / page_size), never less than one.
    pub fn total_pages(&self, total_items: u64) -> u32 {
        let size = u64::from(self.page_size.get());
        let pages = total_items.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Resolve a requested page number against the current item count.
    ///
    /// A requested page of zero is treated as one; anything past the last
    /// page clamps to the last page.
    pub fn window(&self, total_items: u64, requested: u32) -> PageWindow {
        let total_pages = self.total_pages(total_items);
        let number = requested.clamp(1, total_pages);
        let offset = u64::from(number - 1) * u64::from(self.page_size.get());

        PageWindow {
            number,
            offset,
            limit: self.page_size.get(),
            total_pages,
            total_items,
        }
    }

    /// Combine a fetched slice with its window into a page.
    pub fn assemble<T>(&self, window: PageWindow, items: Vec<T>) -> FeedPage<T> {
        FeedPage {
            items,
            number: window.number,
            total_pages: window.total_pages,
            total_items: window.total_items,
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
        }
    }
}

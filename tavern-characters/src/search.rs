//! Paged browsing over an already-filtered result set.
//!
//! Results are fetched once per search. Paging and selection work on that
//! snapshot; only starting a new search queries the store again.

use crate::error::Result;
use crate::store::ListFilter;
use std::num::NonZeroUsize;

/// A fixed sequence split into pages of `page_size`
#[derive(Debug, Clone)]
pub struct PaginatedSearch<T> {
    items: Vec<T>,
    page_size: NonZeroUsize,
    page: usize,
}

impl<T> PaginatedSearch<T> {
    pub fn new(items: Vec<T>, page_size: NonZeroUsize) -> Self {
        Self {
            items,
            page_size,
            page: 0,
        }
    }

    /// Number of items in the whole sequence
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    /// `ceil(len / page_size)`; zero for an empty sequence
    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.page_size.get())
    }

    /// Zero-based index of the current page
    pub fn page_index(&self) -> usize {
        self.page
    }

    /// Items on the current page
    pub fn page(&self) -> &[T] {
        let start = (self.page * self.page_size.get()).min(self.items.len());
        let end = (start + self.page_size.get()).min(self.items.len());
        &self.items[start..end]
    }

    /// Position of the first item of the current page in the sequence
    pub fn page_offset(&self) -> usize {
        self.page * self.page_size.get()
    }

    /// Advance one page. Returns false, without moving, on the last page.
    pub fn next(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page. Returns false, without moving, on the first page.
    pub fn previous(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Item at `index` within the whole sequence
    pub fn select(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Item at `index` within the current page
    pub fn select_on_page(&self, index: usize) -> Option<&T> {
        self.page().get(index)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

/// One interactive browsing session.
///
/// The page position survives navigation and is reset whenever a new
/// search is started.
#[derive(Debug, Clone)]
pub struct SearchSession<T> {
    page_size: NonZeroUsize,
    filter: ListFilter,
    results: PaginatedSearch<T>,
}

impl<T> SearchSession<T> {
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self {
            page_size,
            filter: ListFilter::default(),
            results: PaginatedSearch::new(Vec::new(), page_size),
        }
    }

    /// Run `fetch` for `filter` and start over on page 0
    pub fn start<F>(&mut self, filter: ListFilter, fetch: F) -> Result<&mut PaginatedSearch<T>>
    where
        F: FnOnce(&ListFilter) -> Result<Vec<T>>,
    {
        let items = fetch(&filter)?;
        self.filter = filter;
        self.results = PaginatedSearch::new(items, self.page_size);
        Ok(&mut self.results)
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn results(&self) -> &PaginatedSearch<T> {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut PaginatedSearch<T> {
        &mut self.results
    }
}

use serde::{Deserialize, Serialize};

use crate::ApiError;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// `?page=&page_size=` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Zero-based page index for `Paginator::fetch_page`.
    pub fn index(&self) -> u64 {
        self.page() - 1
    }

    /// Pages past the end are an error, except the first page of an empty listing.
    pub fn ensure_within(&self, count: u64) -> Result<(), ApiError> {
        let page = self.page();
        if page > 1 && (page - 1) * self.page_size() >= count {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(params: PageParams, count: u64, results: Vec<T>) -> Self {
        Self {
            count,
            page: params.page(),
            page_size: params.page_size(),
            results,
        }
    }

    /// Splits the rows off so they can be rendered asynchronously, then put
    /// back with [`Page::with_results`].
    pub fn take_results(self) -> (Vec<T>, Page<()>) {
        let results = self.results;
        let envelope = Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: Vec::new(),
        };
        (results, envelope)
    }

    pub fn with_results<U>(self, results: Vec<U>) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

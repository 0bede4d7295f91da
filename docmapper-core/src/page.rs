//! Pagination extension point.
//!
//! [`Mapper::get_paginator`](crate::mapper::Mapper::get_paginator) counts the
//! cursor, slices it to one page, materializes that page, and hands everything to
//! a [`Paginator`]. The crate ships no page wrapper of its own: the default
//! [`NoPaginator`] fails with [`MapperError::PaginatorNotImplemented`], carrying the
//! [`PageRequest`] so the caller can still build a page without re-querying.
//!
//! [`Page`] and [`PageBuilder`] are building blocks for paginator implementations.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::page::{Page, PageRequest, Paginator};
//!
//! struct SimplePaginator;
//!
//! impl Paginator for SimplePaginator {
//!     type Output = Page<Entity>;
//!
//!     fn paginate(&self, request: PageRequest) -> MapperResult<Self::Output> {
//!         let params = request.params();
//!         let items = request.results.into_entities().unwrap_or_default();
//!
//!         Ok(Page::builder(items.into_iter().map(|(_, entity)| entity).collect())
//!             .with_count(request.total)
//!             .with_next_page(params.next_page(request.total))
//!             .with_previous_page(params.previous_page())
//!             .build())
//!     }
//! }
//! ```

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MapperError, MapperResult},
    mapper::Fetched,
};

/// Everything a paginator needs to wrap one page of results.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// The materialized page, shaped by the mapper's fetch mode.
    pub results: Fetched,
    /// Number of documents matching the cursor before slicing.
    pub total: u64,
    /// Page size.
    pub per_page: u64,
    /// 1-based page number.
    pub page: u64,
    /// Caller options passed through untouched.
    pub options: Document,
}

impl PageRequest {
    /// Returns the page coordinates of this request.
    pub fn params(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

/// Wraps a materialized page into a caller-defined output.
pub trait Paginator {
    /// What a page is turned into.
    type Output;

    /// Builds the page output.
    fn paginate(&self, request: PageRequest) -> MapperResult<Self::Output>;
}

/// The default paginator: always fails with [`MapperError::PaginatorNotImplemented`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    type Output = PageRequest;

    fn paginate(&self, request: PageRequest) -> MapperResult<Self::Output> {
        Err(MapperError::PaginatorNotImplemented(Box::new(request)))
    }
}

/// A single page of results.
///
/// # Type Parameters
///
/// * `T` - The type of items contained in this page
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: u64,
    /// The next page number (if more pages exist).
    pub next_page: Option<u64>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<u64>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for constructing [`Page`] instances with fluent API.
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: u64,
    next_page: Option<u64>,
    previous_page: Option<u64>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    /// Sets the total count of items across all pages.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Sets the next page number (or `None` if this is the last page).
    pub fn with_next_page(mut self, next_page: Option<u64>) -> Self {
        self.next_page = next_page;
        self
    }

    /// Sets the previous page number (or `None` if this is the first page).
    pub fn with_previous_page(mut self, previous_page: Option<u64>) -> Self {
        self.previous_page = previous_page;
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Page coordinates. Pages are 1-indexed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: u64,
    /// Number of items per page.
    pub per_page: u64,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Rejects zero page numbers and page sizes.
    pub fn validate(&self) -> MapperResult<()> {
        if self.page == 0 || self.per_page == 0 {
            return Err(MapperError::InvalidPagination {
                page: self.page,
                per_page: self.per_page,
            });
        }

        Ok(())
    }

    /// Number of items to skip to reach this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.per_page
    }

    /// The following page number, if `total` items leave room for one.
    pub fn next_page(&self, total: u64) -> Option<u64> {
        if self.offset() + self.per_page < total {
            Some(self.page + 1)
        } else {
            None
        }
    }

    /// The preceding page number, if this is not the first page.
    pub fn previous_page(&self) -> Option<u64> {
        if self.page > 1 {
            Some(self.page - 1)
        } else {
            None
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

//! Storage backend abstraction for the mapper.
//!
//! The [`StoreBackend`] trait is the capability interface every document store
//! driver implements. The mapper never talks to a database any other way: cursors
//! are executed through [`StoreBackend::query_documents`], single fetches through
//! [`StoreBackend::find_document`], and writes through the save/update/delete calls.
//!
//! Backends are held behind `Arc<dyn StoreBackend>` in the
//! [`ConnectionRegistry`](crate::registry::ConnectionRegistry), so the trait is
//! object safe and every implementation must be `Send + Sync`.
//!
//! # Examples
//!
//! ```ignore
//! use docmapper::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! backend.insert_documents(vec![doc! { "name": "Alice" }], "users").await?;
//! let alice = backend.find_document(doc! { "name": "Alice" }, None, "users").await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    error::MapperResult,
    query::{FindAndModifyOptions, Query, UpdateOptions, WriteResult},
};

/// Abstract interface for document storage backends.
///
/// Filters, projections, sorts, and updates use the MongoDB document dialect.
/// Errors raised by an implementation are returned to callers unchanged.
///
/// # Ordering
///
/// [`query_documents`](StoreBackend::query_documents) must return documents in the
/// store's natural order unless the query carries a sort, and that order must be
/// stable between calls as long as the collection is not modified.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Executes a query and returns every matching document.
    ///
    /// Sort is applied before skip and limit.
    async fn query_documents(&self, query: Query, collection: &str) -> MapperResult<Vec<Document>>;

    /// Returns the first document matching `filter`, or `None`.
    async fn find_document(
        &self,
        filter: Document,
        projection: Option<Document>,
        collection: &str,
    ) -> MapperResult<Option<Document>>;

    /// Atomically updates the first document matching `filter` and returns it,
    /// either as it was before the update or after, depending on `options`.
    async fn find_and_modify_document(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> MapperResult<Option<Document>>;

    /// Counts the documents matching `filter`, ignoring any skip or limit.
    async fn count_documents(&self, filter: Document, collection: &str) -> MapperResult<u64>;

    /// Inserts new documents. Documents without an `_id` get a fresh one.
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> MapperResult<WriteResult>;

    /// Inserts the document, or replaces the stored document with the same `_id`.
    async fn save_document(&self, document: Document, collection: &str) -> MapperResult<WriteResult>;

    /// Applies an update document (operators or full replacement) to matching documents.
    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> MapperResult<WriteResult>;

    /// Removes every document matching `filter`.
    async fn delete_documents(&self, filter: Document, collection: &str) -> MapperResult<WriteResult>;

    /// Runs an aggregation pipeline and returns the resulting documents.
    async fn aggregate_documents(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> MapperResult<Vec<Document>>;

    /// Drops (deletes) a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> MapperResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> MapperResult<Vec<String>>;

    /// Releases connections held by the backend.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(&self) -> MapperResult<()> {
        Ok(())
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> MapperResult<Self::Backend>;
}

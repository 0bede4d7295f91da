//! Live collection handles.
//!
//! A [`Collection`] pairs a collection name with the backend that stores it. The
//! [`ConnectionRegistry`](crate::registry::ConnectionRegistry) hands these out after
//! resolving which database a model lives in, and the mapper routes every storage
//! call through one.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! let users = registry.collection_for(&User::schema())?;
//! users.insert(vec![doc! { "name": "Alice" }]).await?;
//! assert_eq!(users.count(doc! {}).await?, 1);
//! ```

use bson::Document;

use crate::{
    backend::StoreBackend,
    error::MapperResult,
    query::{FindAndModifyOptions, Query, UpdateOptions, WriteResult},
};

/// A named collection bound to the backend holding it.
///
/// Cheap to copy; it only borrows the backend.
#[derive(Debug, Clone, Copy)]
pub struct Collection<'a> {
    name: &'a str,
    backend: &'a dyn StoreBackend,
}

impl<'a> Collection<'a> {
    /// Creates a new collection reference.
    pub fn new(name: &'a str, backend: &'a dyn StoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Returns the backend holding this collection.
    pub fn backend(&self) -> &'a dyn StoreBackend {
        self.backend
    }

    /// Executes a query and returns the matching documents in iteration order.
    pub async fn find(&self, query: Query) -> MapperResult<Vec<Document>> {
        self.backend
            .query_documents(query, self.name)
            .await
    }

    /// Returns the first document matching `filter`.
    pub async fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> MapperResult<Option<Document>> {
        self.backend
            .find_document(filter, projection, self.name)
            .await
    }

    /// Atomically updates one document and returns it.
    pub async fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: FindAndModifyOptions,
    ) -> MapperResult<Option<Document>> {
        self.backend
            .find_and_modify_document(filter, update, projection, options, self.name)
            .await
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Document) -> MapperResult<u64> {
        self.backend
            .count_documents(filter, self.name)
            .await
    }

    /// Inserts new documents.
    pub async fn insert(&self, documents: Vec<Document>) -> MapperResult<WriteResult> {
        self.backend
            .insert_documents(documents, self.name)
            .await
    }

    /// Inserts or replaces a document by its `_id`.
    pub async fn save(&self, document: Document) -> MapperResult<WriteResult> {
        self.backend
            .save_document(document, self.name)
            .await
    }

    /// Updates matching documents.
    pub async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MapperResult<WriteResult> {
        self.backend
            .update_documents(filter, update, options, self.name)
            .await
    }

    /// Removes matching documents.
    pub async fn remove(&self, filter: Document) -> MapperResult<WriteResult> {
        self.backend
            .delete_documents(filter, self.name)
            .await
    }

    /// Runs an aggregation pipeline.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> MapperResult<Vec<Document>> {
        self.backend
            .aggregate_documents(pipeline, self.name)
            .await
    }
}

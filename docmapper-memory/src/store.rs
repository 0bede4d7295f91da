//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that keeps every collection
//! as an insertion-ordered list of BSON documents behind an async-safe read-write
//! lock.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::{debug, trace};

use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{MapperError, MapperResult},
    identifier::ID_FIELD,
    query::{FindAndModifyOptions, Query, UpdateOptions, WriteResult},
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents, project, sort_documents},
    update::{apply_update, upsert_seed},
};

type CollectionList = Vec<Document>;
type StoreMap = HashMap<String, CollectionList>;


/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
/// Documents keep their insertion order, which is the natural order queries return
/// them in when no sort is given.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). For small to medium
/// datasets (< 100k documents), this is typically acceptable. For larger datasets,
/// consider using a persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     store.insert_documents(vec![doc! { "name": "Alice", "age": 30 }], "users").await?;
///
///     let alice = store.find_document(doc! { "name": "Alice" }, None, "users").await?;
///     assert!(alice.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    ///
    /// The returned store is ready for use and contains no collections or documents.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmapper_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

/// Puts a fresh identifier first when the document has none.
fn with_id(document: Document) -> Document {
    if document.contains_key(ID_FIELD) {
        return document;
    }

    let mut identified = Document::new();
    identified.insert(ID_FIELD, ObjectId::new());

    for (key, value) in document {
        identified.insert(key, value);
    }

    identified
}

fn position_of(documents: &[Document], id: &Bson) -> Option<usize> {
    documents
        .iter()
        .position(|document| document.get(ID_FIELD) == Some(id))
}

fn matching_positions(documents: &[Document], filter: &Document) -> MapperResult<Vec<usize>> {
    let mut positions = Vec::new();

    for (position, document) in documents.iter().enumerate() {
        if DocumentEvaluator::new(document).matches(filter)? {
            positions.push(position);
        }
    }

    Ok(positions)
}

fn stage_count(stage: &str, value: &Bson) -> MapperResult<usize> {
    match value {
        Bson::Int32(count) if *count >= 0 => Ok(*count as usize),
        Bson::Int64(count) if *count >= 0 => Ok(*count as usize),
        _ => Err(MapperError::InvalidDocument(format!("{stage} expects a non-negative integer"))),
    }
}

fn stage_document<'a>(stage: &str, value: &'a Bson) -> MapperResult<&'a Document> {
    value
        .as_document()
        .ok_or_else(|| MapperError::InvalidDocument(format!("{stage} expects a document")))
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn query_documents(&self, query: Query, collection: &str) -> MapperResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut matched = DocumentEvaluator::filter_documents(documents, &query.filter)?;

        if let Some(sort) = &query.sort {
            sort_documents(&mut matched, sort);
        }

        trace!(collection, matched = matched.len(), "evaluated query");

        // A limit of zero means no limit
        Ok(
            matched
                .into_iter()
                .skip(query.skip.unwrap_or(0) as usize)
                .take(query.limit.filter(|limit| *limit > 0).map_or(usize::MAX, |limit| limit as usize))
                .map(|document| project(document, query.projection.as_ref()))
                .collect()
        )
    }

    async fn find_document(
        &self,
        filter: Document,
        projection: Option<Document>,
        collection: &str,
    ) -> MapperResult<Option<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(None),
        };

        for document in documents {
            if DocumentEvaluator::new(document).matches(&filter)? {
                return Ok(Some(project(document.clone(), projection.as_ref())));
            }
        }

        Ok(None)
    }

    async fn find_and_modify_document(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> MapperResult<Option<Document>> {
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let mut candidates = matching_positions(documents, &filter)?;

        if let Some(sort) = &options.sort {
            candidates.sort_by(|&left, &right| compare_documents(&documents[left], &documents[right], sort));
        }

        match candidates.first() {
            Some(&position) => {
                let before = documents[position].clone();
                let mut after = before.clone();
                apply_update(&mut after, &update)?;
                documents[position] = after.clone();

                let returned = if options.return_new { after } else { before };

                Ok(Some(project(returned, projection.as_ref())))
            }
            None if options.upsert => {
                let mut created = upsert_seed(&filter);
                apply_update(&mut created, &update)?;
                let created = with_id(created);

                debug!(collection, "upserted document");
                documents.push(created.clone());

                Ok(options
                    .return_new
                    .then(|| project(created, projection.as_ref())))
            }
            None => Ok(None),
        }
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> MapperResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(documents) => Ok(matching_positions(documents, &filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> MapperResult<WriteResult> {
        let mut store = self.store.write().await;
        let existing = store
            .entry(collection.to_string())
            .or_default();

        let documents: Vec<Document> = documents.into_iter().map(with_id).collect();

        for (index, document) in documents.iter().enumerate() {
            let id = document.get(ID_FIELD).unwrap_or(&Bson::Null);

            if position_of(existing, id).is_some() || position_of(&documents[..index], id).is_some() {
                return Err(MapperError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
            }
        }

        let result = WriteResult {
            modified: documents.len() as u64,
            upserted_id: documents
                .last()
                .and_then(|document| document.get(ID_FIELD))
                .cloned(),
            ..Default::default()
        };

        existing.extend(documents);

        Ok(result)
    }

    async fn save_document(&self, document: Document, collection: &str) -> MapperResult<WriteResult> {
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let document = with_id(document);
        let id = document.get(ID_FIELD).cloned().unwrap_or(Bson::Null);

        match position_of(documents, &id) {
            Some(position) => {
                documents[position] = document;

                Ok(WriteResult {
                    matched: 1,
                    modified: 1,
                    ..Default::default()
                })
            }
            None => {
                documents.push(document);

                Ok(WriteResult {
                    modified: 1,
                    upserted_id: Some(id),
                    ..Default::default()
                })
            }
        }
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> MapperResult<WriteResult> {
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let mut positions = matching_positions(documents, &filter)?;

        if !options.multi {
            positions.truncate(1);
        }

        if positions.is_empty() && options.upsert {
            let mut created = upsert_seed(&filter);
            apply_update(&mut created, &update)?;
            let created = with_id(created);
            let id = created.get(ID_FIELD).cloned();

            documents.push(created);

            return Ok(WriteResult {
                modified: 1,
                upserted_id: id,
                ..Default::default()
            });
        }

        let mut result = WriteResult {
            matched: positions.len() as u64,
            ..Default::default()
        };

        for position in positions {
            let mut updated = documents[position].clone();
            apply_update(&mut updated, &update)?;

            if updated != documents[position] {
                documents[position] = updated;
                result.modified += 1;
            }
        }

        Ok(result)
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> MapperResult<WriteResult> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(WriteResult::default()),
        };

        let positions = matching_positions(documents, &filter)?;

        for &position in positions.iter().rev() {
            documents.remove(position);
        }

        Ok(WriteResult {
            matched: positions.len() as u64,
            deleted: positions.len() as u64,
            ..Default::default()
        })
    }

    async fn aggregate_documents(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> MapperResult<Vec<Document>> {
        let mut documents = self
            .store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        for stage in &pipeline {
            let (name, spec) = stage
                .iter()
                .next()
                .ok_or_else(|| MapperError::InvalidDocument("Empty aggregation stage".to_string()))?;

            documents = match name.as_str() {
                "$match" => DocumentEvaluator::filter_documents(&documents, stage_document(name, spec)?)?,
                "$sort" => {
                    sort_documents(&mut documents, stage_document(name, spec)?);
                    documents
                }
                "$skip" => documents
                    .into_iter()
                    .skip(stage_count(name, spec)?)
                    .collect(),
                "$limit" => documents
                    .into_iter()
                    .take(stage_count(name, spec)?)
                    .collect(),
                "$project" => {
                    let projection = stage_document(name, spec)?;

                    documents
                        .into_iter()
                        .map(|document| project(document, Some(projection)))
                        .collect()
                }
                "$count" => {
                    let field = spec
                        .as_str()
                        .ok_or_else(|| MapperError::InvalidDocument("$count expects a field name".to_string()))?;
                    let mut counted = Document::new();
                    counted.insert(field, documents.len() as i64);

                    vec![counted]
                }
                other => {
                    return Err(MapperError::Backend(format!("Unsupported aggregation stage: {other}")));
                }
            };
        }

        Ok(documents)
    }

    async fn drop_collection(&self, name: &str) -> MapperResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(MapperError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> MapperResult<Vec<String>> {
        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> MapperResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

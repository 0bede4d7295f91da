#![allow(dead_code)]

use async_trait::async_trait;
use bson::Document;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use docmapper::{
    memory::InMemoryStore,
    prelude::*,
};

pub struct Simple;

impl Model for Simple {
    fn collection_name() -> &'static str {
        "simples"
    }
}

pub struct Author;

impl Model for Author {
    fn collection_name() -> &'static str {
        "authors"
    }
}

pub struct Tag;

impl Model for Tag {
    fn collection_name() -> &'static str {
        "tags"
    }
}

pub struct Note;

impl Model for Note {
    fn collection_name() -> &'static str {
        "notes"
    }
}

pub struct Comment;

impl Model for Comment {
    fn collection_name() -> &'static str {
        "comments"
    }
}

pub struct Article;

impl Model for Article {
    fn collection_name() -> &'static str {
        "articles"
    }

    fn embedded() -> Vec<Embedded> {
        vec![
            Embedded::one::<Note>("note"),
            Embedded::many::<Comment>("comments"),
        ]
    }
}

pub struct Stamped;

impl Model for Stamped {
    fn collection_name() -> &'static str {
        "stamped"
    }

    fn timestamps() -> bool {
        true
    }
}

pub struct Connected;

impl Model for Connected {
    fn collection_name() -> &'static str {
        "connected"
    }

    fn connection_name() -> Option<&'static str> {
        Some("second")
    }
}

pub struct Unnamed;

impl Model for Unnamed {
    fn collection_name() -> &'static str {
        ""
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub pages: i32,
}

impl Model for Book {
    fn collection_name() -> &'static str {
        "books"
    }
}

pub fn registry() -> ConnectionRegistry {
    ConnectionRegistry::new(InMemoryStore::new())
}

/// Saves one entity of `M` per document and returns them in order.
pub async fn seed<M: Model>(registry: &ConnectionRegistry, documents: Vec<Document>) -> Vec<Entity> {
    let mut entities = Vec::new();

    for document in documents {
        let mut entity = Entity::from_document(M::schema(), document).unwrap();
        entity.save(registry).await.unwrap();
        entities.push(entity);
    }

    entities
}

/// Records the collection of every query and single fetch it forwards.
#[derive(Debug, Clone, Default)]
pub struct CountingBackend {
    inner: InMemoryStore,
    reads: Arc<Mutex<Vec<String>>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self, collection: &str) -> usize {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|name| *name == collection)
            .count()
    }

    pub fn reset(&self) {
        self.reads.lock().unwrap().clear();
    }

    fn record(&self, collection: &str) {
        self.reads.lock().unwrap().push(collection.to_string());
    }
}

#[async_trait]
impl StoreBackend for CountingBackend {
    async fn query_documents(&self, query: Query, collection: &str) -> MapperResult<Vec<Document>> {
        self.record(collection);
        self.inner.query_documents(query, collection).await
    }

    async fn find_document(
        &self,
        filter: Document,
        projection: Option<Document>,
        collection: &str,
    ) -> MapperResult<Option<Document>> {
        self.record(collection);
        self.inner.find_document(filter, projection, collection).await
    }

    async fn find_and_modify_document(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> MapperResult<Option<Document>> {
        self.inner
            .find_and_modify_document(filter, update, projection, options, collection)
            .await
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> MapperResult<u64> {
        self.inner.count_documents(filter, collection).await
    }

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> MapperResult<WriteResult> {
        self.inner.insert_documents(documents, collection).await
    }

    async fn save_document(&self, document: Document, collection: &str) -> MapperResult<WriteResult> {
        self.inner.save_document(document, collection).await
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> MapperResult<WriteResult> {
        self.inner
            .update_documents(filter, update, options, collection)
            .await
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> MapperResult<WriteResult> {
        self.inner.delete_documents(filter, collection).await
    }

    async fn aggregate_documents(&self, pipeline: Vec<Document>, collection: &str) -> MapperResult<Vec<Document>> {
        self.inner.aggregate_documents(pipeline, collection).await
    }

    async fn drop_collection(&self, name: &str) -> MapperResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn list_collections(&self) -> MapperResult<Vec<String>> {
        self.inner.list_collections().await
    }
}

use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    error::Error as MongoError,
    options::{
        ClientOptions, FindOneAndReplaceOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
        ReturnDocument,
    },
    results::UpdateResult,
};
use tracing::{debug, info};

use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{MapperError, MapperResult},
    identifier::ID_FIELD,
    query::{FindAndModifyOptions, Query, UpdateOptions, WriteResult},
};


fn backend_error(err: MongoError) -> MapperError {
    MapperError::Backend(err.to_string())
}

fn is_operator_update(update: &Document) -> bool {
    update
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn write_result(result: UpdateResult) -> WriteResult {
    WriteResult {
        matched: result.matched_count,
        modified: result.modified_count,
        upserted_id: result.upserted_id,
        ..Default::default()
    }
}

/// MongoDB-backed [`StoreBackend`].
///
/// Filters, projections, sorts, updates, and pipelines are handed to the server
/// as they are.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// Returns the name of the database this store writes to.
    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn query_documents(&self, query: Query, collection: &str) -> MapperResult<Vec<Document>> {
        let mut options = FindOptions::default();

        options.projection = query.projection;
        options.sort = query.sort;
        options.skip = query.skip;

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }

        debug!(collection, filter = ?query.filter, "executing find");

        self.get_collection(collection)
            .find(query.filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn find_document(
        &self,
        filter: Document,
        projection: Option<Document>,
        collection: &str,
    ) -> MapperResult<Option<Document>> {
        let mut options = FindOneOptions::default();
        options.projection = projection;

        self.get_collection(collection)
            .find_one(filter)
            .with_options(options)
            .await
            .map_err(backend_error)
    }

    async fn find_and_modify_document(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> MapperResult<Option<Document>> {
        let return_document = if options.return_new {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        };

        if is_operator_update(&update) {
            let mut update_options = FindOneAndUpdateOptions::default();
            update_options.projection = projection;
            update_options.sort = options.sort;
            update_options.upsert = Some(options.upsert);
            update_options.return_document = Some(return_document);

            self.get_collection(collection)
                .find_one_and_update(filter, update)
                .with_options(update_options)
                .await
                .map_err(backend_error)
        } else {
            let mut replace_options = FindOneAndReplaceOptions::default();
            replace_options.projection = projection;
            replace_options.sort = options.sort;
            replace_options.upsert = Some(options.upsert);
            replace_options.return_document = Some(return_document);

            self.get_collection(collection)
                .find_one_and_replace(filter, update)
                .with_options(replace_options)
                .await
                .map_err(backend_error)
        }
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> MapperResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> MapperResult<WriteResult> {
        if documents.is_empty() {
            return Ok(WriteResult::default());
        }

        let count = documents.len();
        let result = self
            .get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(backend_error)?;

        Ok(WriteResult {
            modified: count as u64,
            upserted_id: result.inserted_ids.get(&(count - 1)).cloned(),
            ..Default::default()
        })
    }

    async fn save_document(&self, document: Document, collection: &str) -> MapperResult<WriteResult> {
        let Some(id) = document.get(ID_FIELD).cloned() else {
            let result = self
                .get_collection(collection)
                .insert_one(document)
                .await
                .map_err(backend_error)?;

            return Ok(WriteResult {
                modified: 1,
                upserted_id: Some(result.inserted_id),
                ..Default::default()
            });
        };

        self.get_collection(collection)
            .replace_one(doc! { ID_FIELD: id }, document)
            .upsert(true)
            .await
            .map(write_result)
            .map_err(backend_error)
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> MapperResult<WriteResult> {
        let collection = self.get_collection(collection);

        let result = if !is_operator_update(&update) {
            collection
                .replace_one(filter, update)
                .upsert(options.upsert)
                .await
        } else if options.multi {
            collection
                .update_many(filter, update)
                .upsert(options.upsert)
                .await
        } else {
            collection
                .update_one(filter, update)
                .upsert(options.upsert)
                .await
        };

        result.map(write_result).map_err(backend_error)
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> MapperResult<WriteResult> {
        let result = self
            .get_collection(collection)
            .delete_many(filter)
            .await
            .map_err(backend_error)?;

        Ok(WriteResult {
            matched: result.deleted_count,
            deleted: result.deleted_count,
            ..Default::default()
        })
    }

    async fn aggregate_documents(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> MapperResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn drop_collection(&self, name: &str) -> MapperResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn list_collections(&self) -> MapperResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(&self) -> MapperResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> MapperResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| MapperError::Initialization(e.to_string()))?,
        )
        .map_err(|e| MapperError::Initialization(e.to_string()))?;

        info!(database = %self.database, "created mongodb client");

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_updates_are_told_apart_from_replacements() {
        assert!(is_operator_update(&doc! { "$set": { "a": 1 } }));
        assert!(!is_operator_update(&doc! { "a": 1 }));
        assert!(!is_operator_update(&doc! {}));
    }
}

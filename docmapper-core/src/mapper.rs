//! The query mapper.
//!
//! A [`Mapper`] is bound to one model and one [`FetchMode`]. Calling
//! [`find`](Mapper::find) opens a deferred cursor; [`sort`](Mapper::sort),
//! [`limit`](Mapper::limit), and [`skip`](Mapper::skip) shape it; a `get` call
//! executes it, shapes the documents per fetch mode, and runs the registered join
//! directives over the batch.
//!
//! ```text
//! Unbound --find--> Bound --get--> Materialized
//!                   |  ^             |
//!                   sort/limit/skip  sort/limit/skip, get again
//! ```
//!
//! Shaping an unbound mapper fails with [`MapperError::NoCursor`]. A mapper carries
//! mutable cursor state and is meant for one query sequence at a time.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use bson::doc;
//!
//! let articles = Article::mapper(&registry)?
//!     .find(doc! { "published": true }, None)?
//!     .sort(doc! { "created_at": -1 })?
//!     .limit(10)?
//!     .join::<Author>("author", Some("author_object"))
//!     .get_entities()
//!     .await?;
//! ```

use bson::{Bson, Document};
use std::{fmt, str::FromStr};
use tracing::debug;

use crate::{
    collection::Collection,
    entity::{Entity, EntityMap},
    error::{MapperError, MapperResult},
    identifier::{ID_FIELD, IntoObjectId, string_form},
    join::{self, JoinDirective},
    model::{Model, Schema},
    page::{NoPaginator, PageRequest, PaginationParams, Paginator},
    query::{FindAndModifyOptions, Query, UpdateOptions, WriteResult},
    registry::ConnectionRegistry,
};

/// How materialized results are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Hydrated [`Entity`] values.
    #[default]
    Object,
    /// Raw documents as stored.
    Array,
    /// Raw documents serialized to JSON text.
    Json,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchMode::Object => "object",
            FetchMode::Array => "array",
            FetchMode::Json => "json",
        })
    }
}

impl FromStr for FetchMode {
    type Err = MapperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "object" => Ok(FetchMode::Object),
            "array" => Ok(FetchMode::Array),
            "json" => Ok(FetchMode::Json),
            _ => Err(MapperError::UnknownFetchMode(value.to_string())),
        }
    }
}

impl TryFrom<u8> for FetchMode {
    type Error = MapperError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FetchMode::Object),
            2 => Ok(FetchMode::Array),
            3 => Ok(FetchMode::Json),
            _ => Err(MapperError::UnknownFetchMode(value.to_string())),
        }
    }
}

/// A materialized cursor, shaped by fetch mode.
///
/// Entities and records are keyed by the string form of their identifier, in
/// cursor order.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// Hydrated entities.
    Entities(EntityMap),
    /// Raw records; each value is a document.
    Records(Document),
    /// Raw records serialized as a JSON object.
    Json(String),
}

impl Fetched {
    /// Returns the entities, if this was fetched in object mode.
    pub fn into_entities(self) -> Option<EntityMap> {
        match self {
            Fetched::Entities(entities) => Some(entities),
            _ => None,
        }
    }

    /// Returns the raw records, if this was fetched in array mode.
    pub fn into_records(self) -> Option<Document> {
        match self {
            Fetched::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Returns the JSON text, if this was fetched in JSON mode.
    pub fn into_json(self) -> Option<String> {
        match self {
            Fetched::Json(json) => Some(json),
            _ => None,
        }
    }
}

/// A single fetched document, shaped by fetch mode.
#[derive(Debug, Clone)]
pub enum FetchedOne {
    /// A hydrated entity, or `None` if nothing matched.
    Entity(Option<Entity>),
    /// The raw record, or `None` if nothing matched.
    Record(Option<Document>),
    /// The record serialized to JSON; `null` if nothing matched.
    Json(String),
}

impl FetchedOne {
    /// Returns the entity, if fetched in object mode and found.
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            FetchedOne::Entity(entity) => entity,
            _ => None,
        }
    }

    /// Returns the record, if fetched in array mode and found.
    pub fn into_record(self) -> Option<Document> {
        match self {
            FetchedOne::Record(record) => record,
            _ => None,
        }
    }

    /// Returns the JSON text, if fetched in JSON mode.
    pub fn into_json(self) -> Option<String> {
        match self {
            FetchedOne::Json(json) => Some(json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Cursor<'r> {
    collection: Collection<'r>,
    query: Query,
}

/// Builds, shapes, and materializes queries for one model.
///
/// # Type Parameters
///
/// * `'r` - Lifetime of the connection registry
/// * `P` - The [`Paginator`] used by [`get_paginator`](Mapper::get_paginator)
#[derive(Debug)]
pub struct Mapper<'r, P = NoPaginator> {
    registry: &'r ConnectionRegistry,
    schema: Schema,
    fetch_mode: FetchMode,
    cursor: Option<Cursor<'r>>,
    joins: Vec<JoinDirective>,
    paginator: P,
}

impl<'r> Mapper<'r, NoPaginator> {
    /// Creates a mapper for the given model.
    ///
    /// # Errors
    ///
    /// Fails if the model has no collection name, the registry is empty, or the
    /// model names a connection the registry does not hold.
    pub fn new(registry: &'r ConnectionRegistry, schema: Schema, fetch_mode: FetchMode) -> MapperResult<Self> {
        if registry.is_empty() {
            return Err(MapperError::NoConnections);
        }

        registry.collection_for(&schema)?;

        Ok(Self {
            registry,
            schema,
            fetch_mode,
            cursor: None,
            joins: Vec::new(),
            paginator: NoPaginator,
        })
    }

    /// Creates an object-mode mapper for model `M`.
    pub fn for_model<M: Model>(registry: &'r ConnectionRegistry) -> MapperResult<Self> {
        Self::new(registry, M::schema(), FetchMode::Object)
    }
}

impl<'r, P: Paginator> Mapper<'r, P> {
    /// Replaces the paginator used by [`get_paginator`](Mapper::get_paginator).
    pub fn with_paginator<Q: Paginator>(self, paginator: Q) -> Mapper<'r, Q> {
        Mapper {
            registry: self.registry,
            schema: self.schema,
            fetch_mode: self.fetch_mode,
            cursor: self.cursor,
            joins: self.joins,
            paginator,
        }
    }

    /// Returns the model descriptor.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the current fetch mode.
    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Sets the fetch mode used by [`get`](Mapper::get) and the `find_one` family.
    pub fn set_fetch_mode(&mut self, fetch_mode: FetchMode) -> &mut Self {
        self.fetch_mode = fetch_mode;
        self
    }

    /// Returns the pending query, or `None` before [`find`](Mapper::find).
    pub fn cursor(&self) -> Option<&Query> {
        self.cursor.as_ref().map(|cursor| &cursor.query)
    }

    /// Returns the registered join directives in order.
    pub fn joins(&self) -> &[JoinDirective] {
        &self.joins
    }

    /// Resolves the model's live collection.
    pub fn collection(&self) -> MapperResult<Collection<'r>> {
        self.registry.collection_for(&self.schema)
    }

    /// Opens a deferred cursor. Nothing is read until a `get` call.
    ///
    /// Any previous cursor, including its sort/skip/limit, is replaced.
    pub fn find(&mut self, filter: Document, projection: Option<Document>) -> MapperResult<&mut Self> {
        let collection = self.collection()?;

        debug!(collection = collection.name(), filter = ?filter, "opened cursor");

        self.cursor = Some(Cursor {
            collection,
            query: Query {
                filter,
                projection,
                ..Default::default()
            },
        });

        Ok(self)
    }

    /// Sorts the pending cursor.
    pub fn sort(&mut self, sort: Document) -> MapperResult<&mut Self> {
        self.cursor_mut()?.query.sort = Some(sort);
        Ok(self)
    }

    /// Limits the pending cursor.
    pub fn limit(&mut self, limit: u64) -> MapperResult<&mut Self> {
        self.cursor_mut()?.query.limit = Some(limit);
        Ok(self)
    }

    /// Skips documents of the pending cursor.
    pub fn skip(&mut self, skip: u64) -> MapperResult<&mut Self> {
        self.cursor_mut()?.query.skip = Some(skip);
        Ok(self)
    }

    /// Registers a join: after materialization, the identifier held in `field` is
    /// replaced by the matching `M` entity (or record), written to `to_field` or
    /// back to `field`.
    pub fn join<M: Model>(&mut self, field: impl Into<String>, to_field: Option<&str>) -> &mut Self {
        self.join_schema(field, M::schema(), to_field)
    }

    /// Registers a join against a model descriptor.
    pub fn join_schema(&mut self, field: impl Into<String>, target: Schema, to_field: Option<&str>) -> &mut Self {
        self.joins.push(JoinDirective::new(field, target, to_field));
        self
    }

    /// Fetches one document and shapes it per fetch mode.
    ///
    /// Does not touch the cursor and runs no joins.
    pub async fn find_one(&self, filter: Document, projection: Option<Document>) -> MapperResult<FetchedOne> {
        let document = self
            .collection()?
            .find_one(filter, projection)
            .await?;

        self.shape_one(document)
    }

    /// Fetches one document as an entity, regardless of fetch mode.
    pub async fn find_one_entity(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> MapperResult<Option<Entity>> {
        let document = self
            .collection()?
            .find_one(filter, projection)
            .await?;

        self.fetch_object(document)
    }

    /// Fetches a document by identifier; strings are parsed into identifiers.
    pub async fn find_by_id(&self, id: impl IntoObjectId) -> MapperResult<FetchedOne> {
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id.into_object_id()?);

        self.find_one(filter, None).await
    }

    /// Atomically updates one document and shapes the returned document per fetch mode.
    pub async fn find_and_modify(
        &self,
        filter: Document,
        update: Document,
        projection: Option<Document>,
        options: FindAndModifyOptions,
    ) -> MapperResult<FetchedOne> {
        let document = self
            .collection()?
            .find_and_modify(filter, update, projection, options)
            .await?;

        self.shape_one(document)
    }

    /// Hydrates a raw document into this mapper's model; `None` stays `None`.
    pub fn fetch_object(&self, document: Option<Document>) -> MapperResult<Option<Entity>> {
        document
            .map(|document| Entity::from_document(self.schema, document))
            .transpose()
    }

    fn shape_one(&self, document: Option<Document>) -> MapperResult<FetchedOne> {
        Ok(match self.fetch_mode {
            FetchMode::Object => FetchedOne::Entity(self.fetch_object(document)?),
            FetchMode::Array => FetchedOne::Record(document),
            FetchMode::Json => FetchedOne::Json(serde_json::to_string(&document)?),
        })
    }

    /// Materializes the cursor per fetch mode and runs the join directives.
    ///
    /// The cursor is kept, so calling `get` again re-executes it.
    pub async fn get(&self) -> MapperResult<Fetched> {
        Ok(match self.fetch_mode {
            FetchMode::Object => Fetched::Entities(self.get_entities().await?),
            FetchMode::Array => Fetched::Records(self.get_array().await?),
            FetchMode::Json => Fetched::Json(self.get_json().await?),
        })
    }

    /// Materializes the cursor as entities, whatever the fetch mode.
    pub async fn get_entities(&self) -> MapperResult<EntityMap> {
        let cursor = self.cursor_ref()?;
        let mut entities = fetch_entities(cursor.collection, self.schema, cursor.query.clone()).await?;

        join::resolve_entities(self.registry, &self.joins, &mut entities).await?;

        Ok(entities)
    }

    /// Materializes the cursor as raw records, whatever the fetch mode.
    ///
    /// The stored fetch mode is left unchanged.
    pub async fn get_array(&self) -> MapperResult<Document> {
        let cursor = self.cursor_ref()?;
        let mut records = fetch_records(cursor.collection, cursor.query.clone()).await?;

        join::resolve_records(self.registry, &self.joins, &mut records).await?;

        Ok(records)
    }

    /// Materializes the cursor as JSON text, whatever the fetch mode.
    ///
    /// The stored fetch mode is left unchanged.
    pub async fn get_json(&self) -> MapperResult<String> {
        Ok(serde_json::to_string(&self.get_array().await?)?)
    }

    /// Materializes one page of the cursor and hands it to the paginator.
    ///
    /// The total is counted before the cursor is sliced to
    /// `skip((page - 1) * per_page).limit(per_page)`; the slice stays on the cursor.
    ///
    /// # Errors
    ///
    /// Fails with [`MapperError::NoCursor`] before `find`, with
    /// [`MapperError::InvalidPagination`] for a zero page or page size, and with
    /// [`MapperError::PaginatorNotImplemented`] when no paginator is attached.
    pub async fn get_paginator(&mut self, per_page: u64, page: u64, options: Document) -> MapperResult<P::Output> {
        let params = PaginationParams::new(page, per_page);
        let cursor = self.cursor_mut()?;
        params.validate()?;

        let total = cursor
            .collection
            .count(cursor.query.filter.clone())
            .await?;

        cursor.query.skip = Some(params.offset());
        cursor.query.limit = Some(per_page);

        let results = self.get().await?;

        self.paginator.paginate(PageRequest {
            results,
            total,
            per_page,
            page,
            options,
        })
    }

    /// Counts documents of the model's collection matching `filter`.
    pub async fn count(&self, filter: Document) -> MapperResult<u64> {
        self.collection()?.count(filter).await
    }

    /// Inserts raw documents into the model's collection.
    pub async fn insert(&self, documents: Vec<Document>) -> MapperResult<WriteResult> {
        self.collection()?.insert(documents).await
    }

    /// Inserts or replaces a raw document by `_id`.
    pub async fn save(&self, document: Document) -> MapperResult<WriteResult> {
        self.collection()?.save(document).await
    }

    /// Updates documents of the model's collection.
    pub async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MapperResult<WriteResult> {
        self.collection()?
            .update(filter, update, options)
            .await
    }

    /// Removes documents of the model's collection.
    pub async fn remove(&self, filter: Document) -> MapperResult<WriteResult> {
        self.collection()?.remove(filter).await
    }

    /// Runs an aggregation pipeline on the model's collection.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> MapperResult<Vec<Document>> {
        self.collection()?.aggregate(pipeline).await
    }

    fn cursor_ref(&self) -> MapperResult<&Cursor<'r>> {
        self.cursor.as_ref().ok_or(MapperError::NoCursor)
    }

    fn cursor_mut(&mut self) -> MapperResult<&mut Cursor<'r>> {
        self.cursor.as_mut().ok_or(MapperError::NoCursor)
    }
}

/// Key of a materialized document: its identifier as a string, or its position.
pub(crate) fn result_key(document: &Document, position: usize) -> String {
    document
        .get(ID_FIELD)
        .map(string_form)
        .unwrap_or_else(|| position.to_string())
}

/// Executes `query` and hydrates every document, keyed by identifier.
pub(crate) async fn fetch_entities(
    collection: Collection<'_>,
    schema: Schema,
    query: Query,
) -> MapperResult<EntityMap> {
    let documents = collection.find(query).await?;

    debug!(collection = collection.name(), count = documents.len(), "materialized entities");

    documents
        .into_iter()
        .enumerate()
        .map(|(position, document)| {
            let key = result_key(&document, position);
            Ok((key, Entity::from_document(schema, document)?))
        })
        .collect()
}

/// Executes `query` and keys every raw document by identifier.
pub(crate) async fn fetch_records(collection: Collection<'_>, query: Query) -> MapperResult<Document> {
    let documents = collection.find(query).await?;

    debug!(collection = collection.name(), count = documents.len(), "materialized records");

    Ok(documents
        .into_iter()
        .enumerate()
        .map(|(position, document)| (result_key(&document, position), Bson::Document(document)))
        .collect())
}

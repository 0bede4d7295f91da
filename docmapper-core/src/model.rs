//! Model declarations.
//!
//! A [`Model`] describes how one kind of entity is stored: its collection, the
//! connection it lives on, whether it carries timestamps, and which fields hold
//! embedded entities. Implementors are usually unit structs or serde structs;
//! the mapper works from the [`Schema`] each model produces.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::model::{Embedded, Model};
//!
//! pub struct Article;
//!
//! impl Model for Article {
//!     fn collection_name() -> &'static str {
//!         "articles"
//!     }
//!
//!     fn embedded() -> Vec<Embedded> {
//!         vec![
//!             Embedded::one::<Note>("note"),
//!             Embedded::many::<Comment>("comments"),
//!         ]
//!     }
//! }
//! ```

use async_trait::async_trait;
use bson::{Document, doc};
use std::any::type_name;

use crate::{
    entity::Entity,
    error::{MapperError, MapperResult},
    identifier::IntoObjectId,
    mapper::{FetchMode, Mapper},
    registry::ConnectionRegistry,
};

/// Declares how an entity type is stored.
pub trait Model: Send + Sync + 'static {
    /// Name of the collection holding this model's documents.
    ///
    /// An empty name makes the model unmappable; every attempt to use it fails
    /// with [`MapperError::MissingCollectionName`].
    fn collection_name() -> &'static str;

    /// Name of the registry connection this model lives on.
    ///
    /// `None` routes the model to the first registered connection.
    fn connection_name() -> Option<&'static str> {
        None
    }

    /// Whether `created_at` and `updated_at` are maintained on save.
    fn timestamps() -> bool {
        false
    }

    /// Fields holding embedded entities.
    fn embedded() -> Vec<Embedded> {
        Vec::new()
    }

    /// Returns the runtime descriptor of this model.
    fn schema() -> Schema
    where
        Self: Sized,
    {
        Schema::of::<Self>()
    }
}

/// Runtime descriptor of a [`Model`].
///
/// Entities and join directives carry a schema instead of a type parameter so
/// that results from different models can be nested inside one another.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    model: &'static str,
    collection: &'static str,
    connection: Option<&'static str>,
    timestamps: bool,
    embedded: fn() -> Vec<Embedded>,
}

impl Schema {
    /// Builds the descriptor of `M`.
    pub fn of<M: Model>() -> Self {
        Self {
            model: type_name::<M>(),
            collection: M::collection_name(),
            connection: M::connection_name(),
            timestamps: M::timestamps(),
            embedded: M::embedded,
        }
    }

    /// Returns the Rust type name of the model.
    pub fn model(&self) -> &'static str {
        self.model
    }

    /// Returns the collection name.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingCollectionName`] if the model declares none.
    pub fn collection(&self) -> MapperResult<&'static str> {
        if self.collection.is_empty() {
            return Err(MapperError::MissingCollectionName(self.model));
        }

        Ok(self.collection)
    }

    /// Returns the connection name, if the model declares one.
    pub fn connection(&self) -> Option<&'static str> {
        self.connection
    }

    /// Returns whether timestamps are maintained on save.
    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    /// Returns the embedded field declarations.
    pub fn embedded(&self) -> Vec<Embedded> {
        (self.embedded)()
    }

    /// Returns the embedded declaration for `field`, if any.
    pub fn embedded_field(&self, field: &str) -> Option<Embedded> {
        self.embedded()
            .into_iter()
            .find(|embedded| embedded.field == field)
    }

    /// Returns `true` if both descriptors belong to the same model.
    pub fn is(&self, other: &Schema) -> bool {
        self.model == other.model
    }
}

/// Whether an embedded field holds one entity or a list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedKind {
    /// A single embedded document.
    One,
    /// An ordered list of embedded documents.
    Many,
}

/// Declares that a field holds embedded entities of another model.
#[derive(Debug, Clone, Copy)]
pub struct Embedded {
    /// Name of the field.
    pub field: &'static str,
    /// One entity or a list.
    pub kind: EmbeddedKind,
    /// Model the embedded documents are hydrated into.
    pub schema: Schema,
}

impl Embedded {
    /// Declares a field holding a single embedded `M`.
    pub fn one<M: Model>(field: &'static str) -> Self {
        Self {
            field,
            kind: EmbeddedKind::One,
            schema: Schema::of::<M>(),
        }
    }

    /// Declares a field holding a list of embedded `M`.
    pub fn many<M: Model>(field: &'static str) -> Self {
        Self {
            field,
            kind: EmbeddedKind::Many,
            schema: Schema::of::<M>(),
        }
    }
}

/// Shortcuts for querying a model's own collection.
///
/// This trait is automatically implemented for all types that implement [`Model`].
#[async_trait]
pub trait ModelExt: Model + Sized {
    /// Returns an object-mode mapper for this model.
    fn mapper(registry: &ConnectionRegistry) -> MapperResult<Mapper<'_>> {
        Mapper::new(registry, Self::schema(), FetchMode::Object)
    }

    /// Returns a mapper for this model with the given fetch mode.
    fn mapper_with(registry: &ConnectionRegistry, fetch_mode: FetchMode) -> MapperResult<Mapper<'_>> {
        Mapper::new(registry, Self::schema(), fetch_mode)
    }

    /// Returns an object-mode mapper with a cursor opened on `filter`.
    fn find(
        registry: &ConnectionRegistry,
        filter: Document,
        projection: Option<Document>,
    ) -> MapperResult<Mapper<'_>> {
        let mut mapper = Self::mapper(registry)?;
        mapper.find(filter, projection)?;

        Ok(mapper)
    }

    /// Returns the first entity matching `filter`.
    async fn find_one(
        registry: &ConnectionRegistry,
        filter: Document,
        projection: Option<Document>,
    ) -> MapperResult<Option<Entity>> {
        Self::mapper(registry)?
            .find_one_entity(filter, projection)
            .await
    }

    /// Returns the entity with the given identifier.
    async fn find_by_id<I>(registry: &ConnectionRegistry, id: I) -> MapperResult<Option<Entity>>
    where
        I: IntoObjectId + Send,
    {
        let id = id.into_object_id()?;

        Self::mapper(registry)?
            .find_one_entity(doc! { "_id": id }, None)
            .await
    }
}

impl<M: Model> ModelExt for M {}

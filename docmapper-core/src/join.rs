//! Relationship resolution.
//!
//! A [`JoinDirective`] replaces an identifier reference held in a field with the
//! referenced document. Directives registered on a mapper are resolved over a whole
//! materialized batch with one lookup per directive; single entities can resolve
//! their own references with [`Entity::join_one`] and [`Entity::join_many`].
//!
//! Only [`ObjectId`](bson::oid::ObjectId) values count as references. Anything else
//! in the source field is left alone.

use bson::{Bson, Document, doc, oid::ObjectId};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::{
    entity::{Entity, EntityMap, FieldValue},
    error::MapperResult,
    identifier::{ID_FIELD, reference},
    mapper::{fetch_entities, fetch_records},
    model::{Model, Schema},
    query::Query,
    registry::ConnectionRegistry,
};

/// A pending batch join.
#[derive(Debug, Clone)]
pub struct JoinDirective {
    /// Field holding the reference.
    pub field: String,
    /// Model the reference points to.
    pub target: Schema,
    /// Field receiving the resolved value; `None` overwrites the source field.
    pub to_field: Option<String>,
}

impl JoinDirective {
    /// Creates a directive.
    pub fn new(field: impl Into<String>, target: Schema, to_field: Option<&str>) -> Self {
        Self {
            field: field.into(),
            target,
            to_field: to_field.map(str::to_string),
        }
    }

    /// Returns the field the resolved value is written to.
    pub fn destination(&self) -> &str {
        self.to_field.as_deref().unwrap_or(&self.field)
    }
}

fn distinct(ids: impl Iterator<Item = ObjectId>) -> Vec<ObjectId> {
    let mut seen = HashSet::new();

    ids.filter(|id| seen.insert(*id)).collect()
}

fn in_filter(ids: Vec<ObjectId>) -> Document {
    doc! { ID_FIELD: { "$in": ids } }
}

/// Resolves every directive over a batch of entities.
///
/// Each directive issues at most one lookup. A reference with no matching document
/// resolves to an explicit null.
pub(crate) async fn resolve_entities(
    registry: &ConnectionRegistry,
    joins: &[JoinDirective],
    batch: &mut EntityMap,
) -> MapperResult<()> {
    for join in joins {
        let ids = distinct(
            batch
                .values()
                .filter_map(|entity| entity.get_bson(&join.field).and_then(reference)),
        );

        if ids.is_empty() {
            debug!(field = %join.field, "no references to join");
            continue;
        }

        let collection = registry.collection_for(&join.target)?;
        let related = fetch_entities(collection, join.target, Query::new(in_filter(ids))).await?;

        debug!(field = %join.field, collection = collection.name(), found = related.len(), "joined batch");

        for entity in batch.values_mut() {
            let Some(id) = entity.get_bson(&join.field).and_then(reference) else {
                trace!(field = %join.field, "skipping entity without a reference");
                continue;
            };

            let value = match related.get(&id.to_hex()) {
                Some(target) => FieldValue::Entity(Box::new(target.clone())),
                None => FieldValue::Value(Bson::Null),
            };

            entity.set_value(join.destination(), value);
        }
    }

    Ok(())
}

/// Resolves every directive over a batch of raw records keyed by identifier.
pub(crate) async fn resolve_records(
    registry: &ConnectionRegistry,
    joins: &[JoinDirective],
    batch: &mut Document,
) -> MapperResult<()> {
    for join in joins {
        let ids = distinct(
            batch
                .values()
                .filter_map(Bson::as_document)
                .filter_map(|record| record.get(&join.field).and_then(reference)),
        );

        if ids.is_empty() {
            debug!(field = %join.field, "no references to join");
            continue;
        }

        let collection = registry.collection_for(&join.target)?;
        let related = fetch_records(collection, Query::new(in_filter(ids))).await?;

        debug!(field = %join.field, collection = collection.name(), found = related.len(), "joined batch");

        for (_, value) in batch.iter_mut() {
            let Bson::Document(record) = value else {
                continue;
            };

            let Some(id) = record.get(&join.field).and_then(reference) else {
                trace!(field = %join.field, "skipping record without a reference");
                continue;
            };

            let resolved = related
                .get(id.to_hex())
                .cloned()
                .unwrap_or(Bson::Null);

            record.insert(join.destination(), resolved);
        }
    }

    Ok(())
}

impl Entity {
    /// Replaces the reference held in `field` with the referenced `M` entity.
    ///
    /// The result is written to `to_field`, or back to `field`. A missing or
    /// non-reference source is left alone; a reference with no matching document
    /// resolves to an explicit null.
    pub async fn join_one<M: Model>(
        &mut self,
        registry: &ConnectionRegistry,
        field: &str,
        to_field: Option<&str>,
        projection: Option<Document>,
    ) -> MapperResult<&mut Self> {
        self.join_one_schema(registry, field, M::schema(), to_field, projection)
            .await
    }

    /// Like [`join_one`](Entity::join_one), against a model descriptor.
    pub async fn join_one_schema(
        &mut self,
        registry: &ConnectionRegistry,
        field: &str,
        target: Schema,
        to_field: Option<&str>,
        projection: Option<Document>,
    ) -> MapperResult<&mut Self> {
        let Some(id) = self.get_bson(field).and_then(reference) else {
            return Ok(self);
        };

        let document = registry
            .collection_for(&target)?
            .find_one(doc! { ID_FIELD: id }, projection)
            .await?;

        let value = match document {
            Some(document) => FieldValue::Entity(Box::new(Entity::from_document(target, document)?)),
            None => FieldValue::Value(Bson::Null),
        };

        self.set_value(to_field.unwrap_or(field), value);

        Ok(self)
    }

    /// Replaces the list of references held in `field` with the referenced `M`
    /// entities, keyed by identifier.
    ///
    /// Elements that are not references are ignored. A missing, empty, or
    /// non-list source is left alone.
    pub async fn join_many<M: Model>(
        &mut self,
        registry: &ConnectionRegistry,
        field: &str,
        to_field: Option<&str>,
        projection: Option<Document>,
    ) -> MapperResult<&mut Self> {
        self.join_many_schema(registry, field, M::schema(), to_field, projection)
            .await
    }

    /// Like [`join_many`](Entity::join_many), against a model descriptor.
    pub async fn join_many_schema(
        &mut self,
        registry: &ConnectionRegistry,
        field: &str,
        target: Schema,
        to_field: Option<&str>,
        projection: Option<Document>,
    ) -> MapperResult<&mut Self> {
        let ids = match self.get_bson(field) {
            Some(Bson::Array(items)) => distinct(items.iter().filter_map(reference)),
            _ => Vec::new(),
        };

        if ids.is_empty() {
            return Ok(self);
        }

        let query = Query {
            filter: in_filter(ids),
            projection,
            ..Default::default()
        };
        let related = fetch_entities(registry.collection_for(&target)?, target, query).await?;

        self.set_value(to_field.unwrap_or(field), FieldValue::Map(related));

        Ok(self)
    }
}

//! Hydrated entities.
//!
//! An [`Entity`] is a stored document turned into an in-memory record: the
//! identifier and its string mirror are held apart from the open set of other
//! fields, and fields declared as embedded by the model are hydrated into nested
//! entities. Converting back with [`Entity::to_document`] always yields the storage
//! form, which never contains the transient string identifier.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{entity::Entity, model::Model};
//! use bson::doc;
//!
//! let mut article = Entity::from_document(Article::schema(), doc! {
//!     "title": "Hello",
//!     "note": { "text": "draft" },
//! })?;
//!
//! assert_eq!(article.get_str("title"), Some("Hello"));
//! assert!(article.embedded("note").is_some());
//!
//! article.save(&registry).await?;
//! assert!(article.string_id().is_some());
//! ```

use bson::{
    Bson, DateTime, Document,
    de::deserialize_from_bson,
    doc,
    oid::ObjectId,
    ser::serialize_to_bson,
};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashMap, fmt::Write};

use crate::{
    error::{MapperError, MapperResult},
    identifier::{ID_FIELD, IntoObjectId, STRING_ID_FIELD, reference, string_form},
    model::{EmbeddedKind, Model, Schema},
    query::WriteResult,
    registry::ConnectionRegistry,
};

/// Field set on first save when the model keeps timestamps.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Field refreshed on every save when the model keeps timestamps.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Default format used by [`Entity::date`].
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%y";
/// Default format used by [`Entity::time`].
pub const DEFAULT_TIME_FORMAT: &str = "%m/%d/%y %H:%M";

/// Value held by an entity field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A plain BSON value, stored as is.
    Value(Bson),
    /// An embedded or joined entity.
    Entity(Box<Entity>),
    /// An embedded list in stored order: records are hydrated, other elements kept as is.
    List(Vec<FieldValue>),
    /// Joined entities keyed by string identifier.
    Map(EntityMap),
}

impl FieldValue {
    /// Returns the plain BSON value, if this field holds one.
    pub fn as_bson(&self) -> Option<&Bson> {
        match self {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` for an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Value(Bson::Null))
    }

    fn to_bson(&self) -> Bson {
        match self {
            FieldValue::Value(value) => value.clone(),
            FieldValue::Entity(entity) => Bson::Document(entity.to_document()),
            FieldValue::List(items) => Bson::Array(items.iter().map(FieldValue::to_bson).collect()),
            FieldValue::Map(entities) => Bson::Document(entities.to_document()),
        }
    }
}

/// A document hydrated into a record of its model.
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Schema,
    id: Option<Bson>,
    string_id: Option<String>,
    fields: Vec<(String, FieldValue)>,
}

impl Entity {
    /// Creates an empty entity of the given model.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            id: None,
            string_id: None,
            fields: Vec::new(),
        }
    }

    /// Creates an empty entity of model `M`.
    pub fn of<M: Model>() -> Self {
        Self::new(M::schema())
    }

    /// Hydrates a raw document into an entity of the given model.
    ///
    /// # Errors
    ///
    /// Fails if an embedded record cannot be hydrated.
    pub fn from_document(schema: Schema, document: Document) -> MapperResult<Self> {
        let mut entity = Self::new(schema);
        entity.fill(document)?;

        Ok(entity)
    }

    /// Converts a serde value into an entity of its own model.
    pub fn from_model<M: Model + Serialize>(value: &M) -> MapperResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(document) => Self::from_document(M::schema(), document),
            other => Err(MapperError::InvalidDocument(format!(
                "{} serialized to {:?} instead of a document",
                M::schema().model(),
                other.element_type(),
            ))),
        }
    }

    /// Deserializes this entity into a serde value.
    ///
    /// The value sees the storage form plus the string identifier under `id`.
    pub fn to_model<T: DeserializeOwned>(&self) -> MapperResult<T> {
        let mut document = self.to_document();

        if let Some(string_id) = &self.string_id {
            document.insert(STRING_ID_FIELD, string_id.clone());
        }

        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    /// Assigns every field of `document` to this entity.
    ///
    /// Fields declared as embedded by the model are hydrated into nested entities:
    /// the record elements of a list field are hydrated in place, and a single field
    /// is hydrated only when it holds a record. Everything else is assigned verbatim.
    /// Any `_id` value is accepted; the string identifier is recomputed afterwards.
    pub fn fill(&mut self, document: Document) -> MapperResult<()> {
        for (key, value) in document {
            match key.as_str() {
                ID_FIELD => {
                    self.id = match value {
                        Bson::Null => None,
                        id => Some(id),
                    }
                }
                STRING_ID_FIELD => {}
                _ => {
                    let value = self.hydrate_field(&key, value)?;
                    self.set_value(key, value);
                }
            }
        }

        self.string_id = self.id.as_ref().map(string_form);

        Ok(())
    }

    fn hydrate_field(&self, key: &str, value: Bson) -> MapperResult<FieldValue> {
        let embedded = match self.schema.embedded_field(key) {
            Some(embedded) => embedded,
            None => return Ok(FieldValue::Value(value)),
        };

        match (embedded.kind, value) {
            (EmbeddedKind::Many, Bson::Array(items)) => Ok(FieldValue::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Bson::Document(document) => Ok(FieldValue::Entity(Box::new(
                            Entity::from_document(embedded.schema, document)?
                        ))),
                        item => Ok(FieldValue::Value(item)),
                    })
                    .collect::<MapperResult<Vec<_>>>()?
            )),
            (EmbeddedKind::One, Bson::Document(document)) => Ok(FieldValue::Entity(Box::new(
                Entity::from_document(embedded.schema, document)?
            ))),
            (_, value) => Ok(FieldValue::Value(value)),
        }
    }

    /// Returns the model descriptor.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the identifier if it is an [`ObjectId`].
    pub fn id(&self) -> Option<ObjectId> {
        self.id.as_ref().and_then(reference)
    }

    /// Returns the identifier as stored, whatever its type.
    pub fn raw_id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }

    /// Returns the string form of the identifier.
    ///
    /// Present on every entity read from storage; cleared on embedded entities
    /// when their parent is saved.
    pub fn string_id(&self) -> Option<&str> {
        self.string_id.as_deref()
    }

    /// Returns `true` if an identifier is assigned.
    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// Sets the identifier (and its string form) from an identifier or a hex string.
    pub fn set_id(&mut self, id: impl IntoObjectId) -> MapperResult<()> {
        let id = id.into_object_id()?;
        self.id = Some(Bson::ObjectId(id));
        self.string_id = Some(id.to_hex());

        Ok(())
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Returns the plain BSON value of a field.
    pub fn get_bson(&self, field: &str) -> Option<&Bson> {
        self.get(field).and_then(FieldValue::as_bson)
    }

    /// Returns the value of a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get_bson(field).and_then(Bson::as_str)
    }

    /// Returns the embedded or joined entity held by a field.
    pub fn embedded(&self, field: &str) -> Option<&Entity> {
        match self.get(field)? {
            FieldValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Returns the records of an embedded list in stored order.
    ///
    /// Elements that are not records stay in the field (see [`Entity::get`]) but
    /// are not returned here.
    pub fn list(&self, field: &str) -> Option<Vec<&Entity>> {
        match self.get(field)? {
            FieldValue::List(items) => Some(
                items
                    .iter()
                    .filter_map(|item| match item {
                        FieldValue::Entity(entity) => Some(entity.as_ref()),
                        _ => None,
                    })
                    .collect()
            ),
            _ => None,
        }
    }

    /// Returns the joined entities held by a field.
    pub fn related(&self, field: &str) -> Option<&EntityMap> {
        match self.get(field)? {
            FieldValue::Map(entities) => Some(entities),
            _ => None,
        }
    }

    /// Returns `true` if the field is set (even to null).
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Iterates over the fields in assignment order, identifiers excluded.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Sets a field to a plain BSON value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.set_value(field, FieldValue::Value(value.into()));
    }

    /// Sets a field, replacing any previous value in place.
    pub fn set_value(&mut self, field: impl Into<String>, value: FieldValue) {
        let field = field.into();

        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Removes a field and returns its value.
    pub fn unset(&mut self, field: &str) -> Option<FieldValue> {
        let position = self
            .fields
            .iter()
            .position(|(name, _)| name == field)?;

        Some(self.fields.remove(position).1)
    }

    /// Returns the storage form of this entity.
    ///
    /// Embedded and joined entities are converted recursively; string identifiers
    /// are never included.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();

        if let Some(id) = &self.id {
            document.insert(ID_FIELD, id.clone());
        }

        for (name, value) in &self.fields {
            document.insert(name.clone(), value.to_bson());
        }

        document
    }

    /// Formats a stored date field, defaulting to [`DEFAULT_DATE_FORMAT`].
    ///
    /// Returns `None` if the field is not a date or the format is invalid.
    pub fn date(&self, field: &str, format: Option<&str>) -> Option<String> {
        self.format_datetime(field, format.unwrap_or(DEFAULT_DATE_FORMAT))
    }

    /// Formats a stored date field, defaulting to [`DEFAULT_TIME_FORMAT`].
    pub fn time(&self, field: &str, format: Option<&str>) -> Option<String> {
        self.format_datetime(field, format.unwrap_or(DEFAULT_TIME_FORMAT))
    }

    fn format_datetime(&self, field: &str, format: &str) -> Option<String> {
        let value: chrono::DateTime<Utc> = match self.get_bson(field)? {
            Bson::DateTime(value) => value.to_chrono(),
            _ => return None,
        };

        let mut formatted = String::new();
        write!(formatted, "{}", value.format(format)).ok()?;

        Some(formatted)
    }

    /// Saves this entity to its model's collection.
    ///
    /// Assigns an identifier on first save and maintains timestamps when the model
    /// asks for them. The string identifier is cleared here and on every embedded
    /// entity before writing; this entity's own is restored afterwards. The
    /// backend's write result is returned unchanged.
    pub async fn save(&mut self, registry: &ConnectionRegistry) -> MapperResult<WriteResult> {
        let collection = registry.collection_for(&self.schema)?;

        if self.schema.timestamps() {
            let now = Bson::DateTime(DateTime::now());

            if !self.has_id() {
                self.set(CREATED_AT_FIELD, now.clone());
            }
            self.set(UPDATED_AT_FIELD, now);
        }

        let id = string_form(
            self.id
                .get_or_insert_with(|| Bson::ObjectId(ObjectId::new()))
        );

        self.string_id = None;
        self.strip_embedded_string_ids();

        let result = collection.save(self.to_document()).await;
        self.string_id = Some(id);

        result
    }

    /// Removes this entity from its model's collection.
    ///
    /// An entity without an identifier was never stored; nothing is removed.
    pub async fn remove(&self, registry: &ConnectionRegistry) -> MapperResult<WriteResult> {
        let collection = registry.collection_for(&self.schema)?;

        match &self.id {
            Some(id) => collection.remove(doc! { ID_FIELD: id.clone() }).await,
            None => Ok(WriteResult::default()),
        }
    }

    fn strip_embedded_string_ids(&mut self) {
        for embedded in self.schema.embedded() {
            match self
                .fields
                .iter_mut()
                .find(|(name, _)| name == embedded.field)
                .map(|(_, value)| value)
            {
                Some(FieldValue::Entity(entity)) => entity.string_id = None,
                Some(FieldValue::List(items)) => items
                    .iter_mut()
                    .for_each(|item| {
                        if let FieldValue::Entity(entity) = item {
                            entity.string_id = None;
                        }
                    }),
                _ => {}
            }
        }
    }
}

/// Entities keyed by string identifier, in the order they were materialized.
///
/// Lookups by key are hashed; iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    entries: Vec<(String, Entity)>,
    index: HashMap<String, usize>,
}

impl EntityMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an entity, replacing any entity with the same key in place.
    pub fn insert(&mut self, key: impl Into<String>, entity: Entity) {
        let key = key.into();

        match self.index.get(&key) {
            Some(&position) => self.entries[position].1 = entity,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, entity));
            }
        }
    }

    /// Returns the entity stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.index
            .get(key)
            .map(|&position| &self.entries[position].1)
    }

    /// Returns `true` if an entity is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the first entity in iteration order.
    pub fn first(&self) -> Option<&Entity> {
        self.entries.first().map(|(_, entity)| entity)
    }

    /// Returns the last entity in iteration order.
    pub fn last(&self) -> Option<&Entity> {
        self.entries.last().map(|(_, entity)| entity)
    }

    /// Iterates over the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Iterates over the entities in order.
    pub fn values(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter().map(|(_, entity)| entity)
    }

    /// Iterates mutably over the entities in order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entries.iter_mut().map(|(_, entity)| entity)
    }

    /// Iterates over key/entity pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entries
            .iter()
            .map(|(key, entity)| (key.as_str(), entity))
    }

    /// Returns the storage form of every entity, keyed the same way.
    pub fn to_document(&self) -> Document {
        self.entries
            .iter()
            .map(|(key, entity)| (key.clone(), Bson::Document(entity.to_document())))
            .collect()
    }
}

impl IntoIterator for EntityMap {
    type Item = (String, Entity);
    type IntoIter = std::vec::IntoIter<(String, Entity)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Entity)> for EntityMap {
    fn from_iter<I: IntoIterator<Item = (String, Entity)>>(iter: I) -> Self {
        let mut map = EntityMap::new();

        for (key, entity) in iter {
            map.insert(key, entity);
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Embedded;

    struct Note;

    impl Model for Note {
        fn collection_name() -> &'static str {
            "notes"
        }
    }

    struct Comment;

    impl Model for Comment {
        fn collection_name() -> &'static str {
            "comments"
        }
    }

    struct Article;

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

    #[test]
    fn fill_assigns_plain_fields_and_string_id() {
        let id = ObjectId::new();
        let entity = Entity::from_document(Article::schema(), doc! {
            "_id": id,
            "title": "test",
            "views": 3,
        })
        .unwrap();

        assert_eq!(entity.id(), Some(id));
        assert_eq!(entity.string_id(), Some(id.to_hex().as_str()));
        assert_eq!(entity.get_str("title"), Some("test"));
        assert_eq!(entity.get_bson("views"), Some(&Bson::Int32(3)));
    }

    #[test]
    fn fill_hydrates_embedded_fields() {
        let entity = Entity::from_document(Article::schema(), doc! {
            "note": { "_id": ObjectId::new(), "text": "remember" },
            "comments": [
                { "text": "first" },
                "not a record",
                { "text": "second" },
            ],
        })
        .unwrap();

        let note = entity.embedded("note").unwrap();
        assert!(note.schema().is(&Note::schema()));
        assert_eq!(note.get_str("text"), Some("remember"));
        assert!(note.string_id().is_some());

        let comments = entity.list("comments").unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].get_str("text"), Some("first"));
        assert_eq!(comments[1].get_str("text"), Some("second"));

        let stored = entity.to_document();
        let stored = stored.get_array("comments").unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1], Bson::String("not a record".into()));
        assert_eq!(stored[2].as_document().unwrap().get_str("text").unwrap(), "second");
    }

    #[test]
    fn embedded_field_with_scalar_value_is_kept_verbatim() {
        let entity = Entity::from_document(Article::schema(), doc! {
            "note": "plain",
            "comments": 5,
        })
        .unwrap();

        assert_eq!(entity.get_str("note"), Some("plain"));
        assert_eq!(entity.get_bson("comments"), Some(&Bson::Int32(5)));
    }

    #[test]
    fn transient_string_id_is_ignored_on_fill_and_never_stored() {
        let id = ObjectId::new();
        let entity = Entity::from_document(Article::schema(), doc! {
            "_id": id,
            "id": "stale",
            "note": { "id": "stale", "text": "x" },
        })
        .unwrap();

        assert_eq!(entity.string_id(), Some(id.to_hex().as_str()));

        let stored = entity.to_document();
        assert!(!stored.contains_key("id"));
        assert!(!stored.get_document("note").unwrap().contains_key("id"));
        assert_eq!(stored.get("_id"), Some(&Bson::ObjectId(id)));
    }

    #[test]
    fn identifiers_of_any_type_are_kept() {
        let entity = Entity::from_document(Article::schema(), doc! { "_id": "custom-key", "title": "x" }).unwrap();

        assert!(entity.has_id());
        assert_eq!(entity.id(), None);
        assert_eq!(entity.raw_id(), Some(&Bson::String("custom-key".into())));
        assert_eq!(entity.string_id(), Some("custom-key"));
        assert_eq!(entity.to_document().get_str("_id").unwrap(), "custom-key");

        let entity = Entity::from_document(Article::schema(), doc! { "_id": 42 }).unwrap();
        assert_eq!(entity.string_id(), Some("42"));
    }

    #[test]
    fn set_id_accepts_hex_strings() {
        let mut entity = Entity::of::<Article>();
        entity.set_id("51d57f68b7846c9816000003").unwrap();

        assert!(entity.has_id());
        assert_eq!(entity.string_id(), Some("51d57f68b7846c9816000003"));
        assert!(entity.set_id("nope").is_err());
    }

    #[test]
    fn set_replaces_in_place_and_unset_removes() {
        let mut entity = Entity::of::<Article>();
        entity.set("a", 1);
        entity.set("b", 2);
        entity.set("a", 3);

        let names: Vec<_> = entity.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(entity.get_bson("a"), Some(&Bson::Int32(3)));

        assert!(entity.unset("a").is_some());
        assert!(!entity.contains("a"));
        assert!(entity.unset("a").is_none());
    }

    #[test]
    fn formats_dates_with_defaults_and_custom_formats() {
        let mut entity = Entity::of::<Article>();
        entity.set("published", DateTime::from_millis(1_372_953_600_000));
        entity.set("title", "not a date");

        assert_eq!(entity.date("published", None).as_deref(), Some("07/04/13"));
        assert_eq!(entity.time("published", None).as_deref(), Some("07/04/13 16:00"));
        assert_eq!(entity.date("published", Some("%Y-%m-%d")).as_deref(), Some("2013-07-04"));
        assert_eq!(entity.date("title", None), None);
        assert_eq!(entity.date("missing", None), None);
    }

    #[test]
    fn entity_map_keeps_insertion_order_and_replaces_in_place() {
        let mut map = EntityMap::new();
        map.insert("b", Entity::of::<Note>());
        map.insert("a", Entity::of::<Note>());
        map.insert("b", Entity::of::<Comment>());

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(map.first().unwrap().schema().is(&Comment::schema()));
        assert!(map.contains_key("a"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn entity_map_lookups_stay_consistent_across_many_keys() {
        let mut map: EntityMap = (0..1_000)
            .map(|n| (n.to_string(), Entity::of::<Note>()))
            .collect();

        map.insert("500", Entity::of::<Comment>());
        map.insert("1000", Entity::of::<Comment>());

        assert_eq!(map.len(), 1_001);
        assert!(map.get("500").unwrap().schema().is(&Comment::schema()));
        assert!(map.get("499").unwrap().schema().is(&Note::schema()));
        assert_eq!(map.keys().nth(500), Some("500"));
        assert_eq!(map.keys().last(), Some("1000"));
        assert!(map.get("missing").is_none());
    }
}

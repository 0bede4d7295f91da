//! Document identifiers.
//!
//! Documents are identified by a BSON [`ObjectId`] stored under [`ID_FIELD`]. Its
//! hexadecimal form is mirrored on hydrated entities and used as the key of
//! materialized result maps.

use bson::{Bson, oid::ObjectId};

use crate::error::{MapperError, MapperResult};

/// Field holding the persisted identifier.
pub const ID_FIELD: &str = "_id";

/// Transient field holding the string form of the identifier.
///
/// It is never written to storage.
pub const STRING_ID_FIELD: &str = "id";

/// Conversion into a document identifier.
///
/// Implemented for [`ObjectId`] and for hexadecimal strings.
pub trait IntoObjectId {
    /// Converts `self` into an [`ObjectId`].
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::InvalidIdentifier`] if a string is not a valid identifier.
    fn into_object_id(self) -> MapperResult<ObjectId>;
}

impl IntoObjectId for ObjectId {
    fn into_object_id(self) -> MapperResult<ObjectId> {
        Ok(self)
    }
}

impl IntoObjectId for &ObjectId {
    fn into_object_id(self) -> MapperResult<ObjectId> {
        Ok(*self)
    }
}

impl IntoObjectId for &str {
    fn into_object_id(self) -> MapperResult<ObjectId> {
        ObjectId::parse_str(self).map_err(|_| MapperError::InvalidIdentifier(self.to_string()))
    }
}

impl IntoObjectId for String {
    fn into_object_id(self) -> MapperResult<ObjectId> {
        self.as_str().into_object_id()
    }
}

impl IntoObjectId for &String {
    fn into_object_id(self) -> MapperResult<ObjectId> {
        self.as_str().into_object_id()
    }
}

/// Returns the identifier held by `value` if it is a well-formed reference.
pub fn reference(value: &Bson) -> Option<ObjectId> {
    match value {
        Bson::ObjectId(id) => Some(*id),
        _ => None,
    }
}

/// Returns the string form of an identifier: hex for an [`ObjectId`], the text of
/// a string, and the display form of anything else.
pub fn string_form(value: &Bson) -> String {
    match value {
        Bson::ObjectId(id) => id.to_hex(),
        Bson::String(id) => id.clone(),
        other => other.to_string(),
    }
}

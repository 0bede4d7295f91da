//! Error types and result types for mapper operations.
//!
//! Every fallible operation in this crate returns [`MapperResult<T>`]. Errors fall
//! into three groups:
//!
//! - **Configuration** errors (missing collection name, unknown connection, no
//!   paginator) are raised before any storage call is made.
//! - **Precondition** errors (shaping a query before `find`, invalid page numbers,
//!   malformed identifiers) are raised by the call that was misused.
//! - **Driver** errors are whatever the storage backend reported, passed through.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::page::PageRequest;

/// Represents all possible errors raised by the mapper and its storage backends.
#[derive(Error, Debug)]
pub enum MapperError {
    /// The model declares an empty collection name and cannot be mapped.
    #[error("There's no collection name for {0}")]
    MissingCollectionName(&'static str),
    /// A mapper was requested but the registry holds no connections.
    #[error("No database connection registered")]
    NoConnections,
    /// The model asks for a connection name the registry does not know.
    #[error("Unknown database connection: {0}")]
    UnknownConnection(String),
    /// A fetch mode could not be parsed.
    #[error("Unknown fetch mode: {0}")]
    UnknownFetchMode(String),
    /// `get_paginator` was called on a mapper without a [`Paginator`](crate::page::Paginator).
    ///
    /// The boxed request carries everything needed to build a page without re-querying.
    #[error(
        "No paginator configured, attach one with `with_paginator` (per_page: {}, page: {}, total: {})",
        .0.per_page, .0.page, .0.total
    )]
    PaginatorNotImplemented(Box<PageRequest>),
    /// A shaping or materializing call was made before `find`.
    #[error("There is no cursor, call find before shaping or fetching results")]
    NoCursor,
    /// Page number or page size was zero.
    #[error("Invalid pagination: page {page}, per page {per_page}")]
    InvalidPagination { page: u64, per_page: u64 },
    /// A string could not be converted into a document identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl MapperError {
    /// Returns `true` for errors caused by model or registry configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MapperError::MissingCollectionName(_)
                | MapperError::NoConnections
                | MapperError::UnknownConnection(_)
                | MapperError::UnknownFetchMode(_)
                | MapperError::PaginatorNotImplemented(_)
        )
    }

    /// Returns `true` for errors caused by calling an operation in the wrong state
    /// or with unusable arguments.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            MapperError::NoCursor
                | MapperError::InvalidPagination { .. }
                | MapperError::InvalidIdentifier(_)
        )
    }
}

/// A specialized `Result` type for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

impl From<BsonError> for MapperError {
    fn from(err: BsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MapperError {
    fn from(err: SerdeJsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

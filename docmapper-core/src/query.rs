//! Query and write descriptors exchanged with storage backends.
//!
//! Filters, projections, sorts, and updates are plain BSON documents in the
//! MongoDB dialect; this crate does not wrap them in an expression language.
//! A [`Query`] is what a deferred cursor carries until it is materialized.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::query::Query;
//! use bson::doc;
//!
//! let query = Query {
//!     sort: Some(doc! { "created_at": -1 }),
//!     skip: Some(20),
//!     limit: Some(10),
//!     ..Query::new(doc! { "status": "active" })
//! };
//! ```

use bson::{Bson, Document};

/// A deferred find over one collection.
///
/// The filter and projection are fixed when the cursor is opened; sort, skip,
/// and limit may be changed until the query is executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter document matching the wanted documents. Empty matches everything.
    pub filter: Document,
    /// Optional projection selecting which fields are returned.
    pub projection: Option<Document>,
    /// Optional sort specification, e.g. `{ "letter": 1 }`.
    pub sort: Option<Document>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl Query {
    /// Creates a query for the given filter with no shaping applied.
    pub fn new(filter: Document) -> Self {
        Query {
            filter,
            ..Default::default()
        }
    }
}

/// Options for an atomic fetch-and-update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    /// Picks which document is modified when several match.
    pub sort: Option<Document>,
    /// Inserts a document built from the filter and update when nothing matches.
    pub upsert: bool,
    /// Returns the document after the update instead of before it.
    pub return_new: bool,
}

/// Options for a passthrough update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// Updates every matching document instead of only the first one.
    pub multi: bool,
    /// Inserts a document built from the filter and update when nothing matches.
    pub upsert: bool,
}

/// Outcome of a write as reported by the storage backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    /// Number of documents matched by the write's filter.
    pub matched: u64,
    /// Number of documents changed (or inserted).
    pub modified: u64,
    /// Number of documents removed.
    pub deleted: u64,
    /// Identifier of a document created by an upsert or insert.
    pub upserted_id: Option<Bson>,
}

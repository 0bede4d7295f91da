//! Convenient re-exports of commonly used types from docmapper.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```
//!
//! This provides access to:
//! - Model traits and descriptors
//! - Entities and the query mapper
//! - Connections and store backends
//! - Pagination and rollback
//! - Error types

pub use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    entity::{Entity, EntityMap, FieldValue},
    error::{MapperError, MapperResult},
    identifier::IntoObjectId,
    join::JoinDirective,
    mapper::{FetchMode, Fetched, FetchedOne, Mapper},
    model::{Embedded, EmbeddedKind, Model, ModelExt, Schema},
    page::{NoPaginator, Page, PageRequest, PaginationParams, Paginator},
    query::{FindAndModifyOptions, Query, UpdateOptions, WriteResult},
    registry::ConnectionRegistry,
    rollback::RollbackRegistry,
};

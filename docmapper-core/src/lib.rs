//! A document mapper for schemaless document stores.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Models** ([`model`]) - Declaring collections, connections, timestamps, and embedded fields
//! - **Entities** ([`entity`]) - Hydrating stored documents into records and back
//! - **Query mapper** ([`mapper`]) - Deferred, chainable queries with per-mode result shaping
//! - **Joins** ([`join`]) - Batched resolution of identifier references
//! - **Connections** ([`registry`]) - Named storage backends shared by every mapper
//! - **Store backend abstraction** ([`backend`]) - The capability interface drivers implement
//! - **Collections interface** ([`collection`]) - A collection name bound to a backend
//! - **Pagination** ([`page`]) - The paginator extension point
//! - **Rollback** ([`rollback`]) - Ordered compensating actions for multi-step writes
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use bson::doc;
//!
//! pub struct Simple;
//!
//! impl Model for Simple {
//!     fn collection_name() -> &'static str {
//!         "simples"
//!     }
//! }
//!
//! let registry = ConnectionRegistry::new(InMemoryStore::new());
//!
//! let mut entity = Entity::of::<Simple>();
//! entity.set("letter", "a");
//! entity.save(&registry).await?;
//!
//! let letters = Simple::find(&registry, doc! {}, None)?
//!     .sort(doc! { "letter": 1 })?
//!     .get_entities()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod backend;
pub mod collection;
pub mod entity;
pub mod error;
pub mod identifier;
pub mod join;
pub mod mapper;
pub mod model;
pub mod page;
pub mod query;
pub mod registry;
pub mod rollback;

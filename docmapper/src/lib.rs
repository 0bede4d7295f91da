//! Main docmapper crate: a document mapper for schemaless document stores.
//!
//! This crate is the primary entry point for users of the docmapper framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the storage backends.
//!
//! # Features
//!
//! - **Entity hydration** - Stored documents become entities with embedded sub-entities
//! - **Chainable queries** - `find`, `sort`, `skip`, `limit`, then materialize as
//!   entities, raw records, or JSON
//! - **Batched joins** - Resolve identifier references for a whole result set with one lookup
//! - **Named connections** - Route each model to its own database
//! - **Pagination hook** - Plug in any page wrapper through the `Paginator` trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! pub struct Author;
//!
//! impl Model for Author {
//!     fn collection_name() -> &'static str { "authors" }
//! }
//!
//! pub struct Article;
//!
//! impl Model for Article {
//!     fn collection_name() -> &'static str { "articles" }
//!     fn timestamps() -> bool { true }
//! }
//!
//! #[tokio::main]
//! async fn main() -> MapperResult<()> {
//!     let registry = ConnectionRegistry::new(InMemoryStore::builder().build().await?);
//!
//!     let mut author = Entity::of::<Author>();
//!     author.set("name", "Ada");
//!     author.save(&registry).await?;
//!
//!     let mut article = Entity::of::<Article>();
//!     article.set("title", "Hello");
//!     article.set("author", author.id());
//!     article.save(&registry).await?;
//!
//!     let articles = Article::find(&registry, doc! {}, None)?
//!         .sort(doc! { "title": 1 })?
//!         .join::<Author>("author", Some("author_object"))
//!         .get_entities()
//!         .await?;
//!
//!     for article in articles.values() {
//!         println!("{:?}", article.embedded("author_object"));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Fetch Modes
//!
//! A mapper created with [`FetchMode::Array`](mapper::FetchMode::Array) returns raw
//! documents keyed by identifier, and [`FetchMode::Json`](mapper::FetchMode::Json)
//! returns the same documents as JSON text. `get_array` and `get_json` give those
//! shapes on any mapper without changing its mode.
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmapper_core::{
    backend, collection, entity, error, identifier, join, mapper, model, page, query, registry, rollback,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmapper_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmapper_mongodb::{ConnectionConfig, MongoConfig, MongoDbStore, MongoDbStoreBuilder};
}

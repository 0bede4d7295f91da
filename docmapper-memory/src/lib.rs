//! In-memory document storage backend for docmapper.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Natural order** - Collections keep documents in insertion order
//! - **MongoDB query dialect** - Filters, projections, multi-key sorts, and update operators
//! - **Basic aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$project`, and `$count`
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! pub struct User;
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let registry = ConnectionRegistry::new(backend);
//!
//!     let mut user = Entity::of::<User>();
//!     user.set("name", "Alice");
//!     user.save(&registry).await?;
//!
//!     let alice = User::find_one(&registry, doc! { "name": "Alice" }, None).await?;
//!     assert!(alice.is_some());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

pub mod store;
pub(crate) mod evaluator;
pub(crate) mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

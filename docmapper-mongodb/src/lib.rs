//! MongoDB backend implementation for docmapper.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, projections, sorts, updates, and aggregation pipelines are passed to
//! the server untouched, so everything MongoDB supports is available to mappers.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmapper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! A single store is built from a connection string and a database name; several
//! named connections are usually described by a [`MongoConfig`].
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{backend::StoreBackendBuilder, mongodb::{MongoConfig, MongoDbStore}, registry::ConnectionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let registry = ConnectionRegistry::new(store);
//!
//!     let registry = MongoConfig::default()
//!         .with_connection("main", "mongodb://localhost:27017", "app")
//!         .with_connection("archive", "mongodb://localhost:27017", "archive")
//!         .connect()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_mongodb;

pub mod config;
pub mod store;

pub use config::{ConnectionConfig, MongoConfig};
pub use store::{MongoDbStore, MongoDbStoreBuilder};

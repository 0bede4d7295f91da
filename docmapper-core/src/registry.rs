//! Named database connections.
//!
//! A [`ConnectionRegistry`] maps connection names to storage backends. Models that
//! declare a connection name are routed to that backend; all others use the first
//! registered connection. The registry is built once and is immutable afterwards,
//! so it can be shared freely (by reference or inside an `Arc`) between mappers.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{registry::ConnectionRegistry, memory::InMemoryStore};
//!
//! // A single backend becomes the "default" connection.
//! let registry = ConnectionRegistry::new(InMemoryStore::new());
//!
//! // Several named backends; "first" is used by models without a connection name.
//! let registry = ConnectionRegistry::builder()
//!     .connection("first", InMemoryStore::new())
//!     .connection("second", InMemoryStore::new())
//!     .build()?;
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::{MapperError, MapperResult},
    model::Schema,
};

/// Name given to the connection when a registry is created from a single backend.
pub const DEFAULT_CONNECTION: &str = "default";

/// Immutable mapping from connection name to storage backend.
///
/// Registration order is kept; the first entry is the fallback for models that
/// do not name a connection.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    connections: Vec<(String, Arc<dyn StoreBackend>)>,
}

impl ConnectionRegistry {
    /// Creates a registry holding `backend` as the `"default"` connection.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            connections: vec![(DEFAULT_CONNECTION.to_string(), Arc::new(backend))],
        }
    }

    /// Creates a builder for registering several named connections.
    pub fn builder() -> ConnectionRegistryBuilder {
        ConnectionRegistryBuilder::default()
    }

    /// Returns the registered connection names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections
            .iter()
            .map(|(name, _)| name.as_str())
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Resolves a backend by connection name.
    ///
    /// `None` selects the first registered connection.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownConnection`] if `name` is not registered and
    /// [`MapperError::NoConnections`] if the registry is empty.
    pub fn database(&self, name: Option<&str>) -> MapperResult<&dyn StoreBackend> {
        match name {
            Some(name) => self
                .connections
                .iter()
                .find(|(registered, _)| registered == name)
                .map(|(_, backend)| backend.as_ref())
                .ok_or_else(|| MapperError::UnknownConnection(name.to_string())),
            None => self
                .connections
                .first()
                .map(|(_, backend)| backend.as_ref())
                .ok_or(MapperError::NoConnections),
        }
    }

    /// Resolves the live collection a model is stored in.
    ///
    /// # Errors
    ///
    /// Fails if the model has no collection name or names an unknown connection.
    pub fn collection_for(&self, schema: &Schema) -> MapperResult<Collection<'_>> {
        let collection = schema.collection()?;
        let backend = self.database(schema.connection())?;

        debug!(
            model = schema.model(),
            collection,
            connection = schema.connection().unwrap_or(DEFAULT_CONNECTION),
            "resolved collection"
        );

        Ok(Collection::new(collection, backend))
    }

    /// Shuts down every registered backend.
    pub async fn shutdown(&self) -> MapperResult<()> {
        for (_, backend) in &self.connections {
            backend.shutdown().await?;
        }

        Ok(())
    }
}

/// Builder for registries with several named connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistryBuilder {
    connections: Vec<(String, Arc<dyn StoreBackend>)>,
}

impl ConnectionRegistryBuilder {
    /// Registers a backend under `name`.
    ///
    /// Registering an existing name replaces its backend but keeps its position.
    pub fn connection(self, name: impl Into<String>, backend: impl StoreBackend + 'static) -> Self {
        self.shared_connection(name, Arc::new(backend))
    }

    /// Registers an already shared backend under `name`.
    pub fn shared_connection(mut self, name: impl Into<String>, backend: Arc<dyn StoreBackend>) -> Self {
        let name = name.into();

        match self
            .connections
            .iter_mut()
            .find(|(registered, _)| *registered == name)
        {
            Some(entry) => entry.1 = backend,
            None => self.connections.push((name, backend)),
        }

        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::NoConnections`] if nothing was registered.
    pub fn build(self) -> MapperResult<ConnectionRegistry> {
        if self.connections.is_empty() {
            return Err(MapperError::NoConnections);
        }

        Ok(ConnectionRegistry {
            connections: self.connections,
        })
    }
}

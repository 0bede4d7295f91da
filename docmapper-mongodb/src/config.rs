//! Connection configuration.
//!
//! A [`MongoConfig`] names every MongoDB connection an application uses and turns
//! them into a [`ConnectionRegistry`]. Connections keep the order they are declared
//! in, so the first one is the fallback for models without a connection name.
//!
//! ```json
//! {
//!     "connections": {
//!         "main": { "uri": "mongodb://localhost:27017", "database": "app" },
//!         "archive": { "uri": "mongodb://archive:27017", "database": "archive" }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use docmapper_core::{
    backend::StoreBackendBuilder,
    error::MapperResult,
    registry::ConnectionRegistry,
};

use crate::store::MongoDbStore;

/// One MongoDB connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    /// Database the connection reads and writes.
    pub database: String,
}

/// Named MongoDB connections in declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MongoConfig {
    #[serde(with = "ordered_map")]
    pub connections: Vec<(String, ConnectionConfig)>,
}

impl MongoConfig {
    /// Adds a connection, keeping declaration order.
    pub fn with_connection(mut self, name: impl Into<String>, uri: impl Into<String>, database: impl Into<String>) -> Self {
        self.connections.push((
            name.into(),
            ConnectionConfig {
                uri: uri.into(),
                database: database.into(),
            },
        ));
        self
    }

    /// Opens a client per connection and registers them in declaration order.
    ///
    /// # Errors
    ///
    /// Fails with [`MapperError::Initialization`](docmapper_core::error::MapperError::Initialization)
    /// if a connection string cannot be parsed, and with
    /// [`MapperError::NoConnections`](docmapper_core::error::MapperError::NoConnections)
    /// if nothing is configured.
    pub async fn connect(&self) -> MapperResult<ConnectionRegistry> {
        let mut registry = ConnectionRegistry::builder();

        for (name, connection) in &self.connections {
            let store = MongoDbStore::builder(&connection.uri, &connection.database)
                .build()
                .await?;

            info!(connection = %name, database = %connection.database, "registered mongodb connection");

            registry = registry.connection(name.clone(), store);
        }

        registry.build()
    }
}

mod ordered_map {
    use serde::{
        Deserialize, Deserializer, Serialize, Serializer,
        de::{MapAccess, Visitor},
    };
    use std::{fmt, marker::PhantomData};

    pub fn serialize<S, V>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(entries.iter().map(|(key, value)| (key, value)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of named connections")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));

                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }

                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let config: MongoConfig = serde_json::from_str(
            r#"{
                "connections": {
                    "zeta": { "uri": "mongodb://localhost:27017", "database": "z" },
                    "alpha": { "uri": "mongodb://localhost:27018", "database": "a" }
                }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = config
            .connections
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(config.connections[1].1.database, "a");
    }

    #[test]
    fn serializes_back_to_a_map() {
        let config = MongoConfig::default().with_connection("main", "mongodb://localhost:27017", "app");
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["connections"]["main"]["database"], "app");
    }

    #[tokio::test]
    async fn empty_config_has_no_connections() {
        let err = MongoConfig::default().connect().await.unwrap_err();

        assert!(err.is_configuration());
    }
}

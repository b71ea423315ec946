//! # Tessera
//!
//! Typed entity executors over document, column-family and graph database
//! drivers.
//!
//! Each executor converts user entities to the request objects its driver
//! expects and converts results back to entities, maps or scalars. The
//! drivers themselves stay behind narrow traits; every backend crate ships
//! an optional adapter for a real client.
//!
//! ## Feature Flags
//!
//! - `couchbase` (default) - N1QL executor
//! - `hbase` (default) - column-family executor
//! - `mongodb` (default) - document executor
//! - `neo4j` (default) - graph executor
//! - `couchbase-rest` - Query Service REST adapter
//! - `hbase-rest` - HBase REST gateway adapter
//! - `mongodb-driver` - adapter over the official MongoDB driver
//! - `neo4j-driver` - Bolt adapter over `neo4rs`
//! - `full` - every executor and adapter
//!
//! ## Quick Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tessera::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Account {
//!     id: String,
//!     display_name: String,
//! }
//!
//! impl Entity for Account {}
//!
//! let settings = ExecutorSettings::from_toml_str(r#"naming_policy = "kebab-case""#).unwrap();
//! let registry = EntityRegistry::new();
//! let meta = registry.meta::<Account>(settings.naming_policy).unwrap();
//! assert_eq!(meta.column_of("display_name"), "display-name");
//! ```

pub mod core;
#[cfg(feature = "couchbase")]
pub mod couchbase;
#[cfg(feature = "hbase")]
pub mod hbase;
#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(feature = "neo4j")]
pub mod neo4j;

pub use tessera_core::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
	pub use tessera_core::prelude::*;

	#[cfg(feature = "couchbase")]
	pub use tessera_couchbase::{CouchbaseExecutor, QueryParams};
	#[cfg(feature = "hbase")]
	pub use tessera_hbase::{HBaseColumn, HBaseExecutor, Versions};
	#[cfg(feature = "mongodb")]
	pub use tessera_mongodb::{CollectionExecutor, MongoExecutor};
	#[cfg(feature = "neo4j")]
	pub use tessera_neo4j::Neo4jExecutor;
}

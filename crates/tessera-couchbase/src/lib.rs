//! # Tessera Couchbase
//!
//! Entity executor over a Couchbase bucket and its N1QL query service.
//!
//! ## Features
//!
//! - **Key/value**: `get`, `insert`, `upsert`, `replace`, `remove` with the
//!   entity identifier as document key
//! - **N1QL**: parameterized statements mapped onto entities, maps or scalars
//! - **Statement cache**: parsed statements are reused by literal text
//! - `rest`: [`RestCluster`] adapter for the Query Service REST endpoint
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_couchbase::{CouchbaseExecutor, QueryParams, RestCluster, RestClusterConfig};
//!
//! let cluster = Arc::new(RestCluster::new(
//!     RestClusterConfig::new("http://localhost:8093", "travel-sample")
//!         .credentials("Administrator", "password"),
//! )?);
//! let executor = CouchbaseExecutor::new(cluster.clone(), cluster)?;
//!
//! let airline: Option<Airline> = executor.get("airline_10").await?;
//! let names: Vec<String> = executor
//!     .query_as("SELECT name FROM `travel-sample` WHERE country = $1", QueryParams::single("France")?)
//!     .await?;
//! ```

pub mod client;
pub mod executor;
pub mod params;
pub mod query;
#[cfg(feature = "rest")]
pub mod rest;
pub mod statement;

pub use client::{Bucket, JsonDocument, QueryService};
pub use executor::{CouchbaseExecutor, CouchbaseExecutorBuilder};
pub use params::{BoundParams, QueryParams};
pub use query::{
	QueryError, QueryMetrics, QueryOptions, QueryRequest, QueryResponse, QueryStatus,
	ScanConsistency,
};
#[cfg(feature = "rest")]
pub use rest::{RestCluster, RestClusterConfig};
pub use statement::{ParsedStatement, PlaceholderStyle};

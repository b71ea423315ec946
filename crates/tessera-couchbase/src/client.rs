//! Native client seams
//!
//! The executor talks to Couchbase through two object-safe traits: a
//! [`QueryService`] executing N1QL and a [`Bucket`] for key/value access.
//! Any client implementing them can back a [`CouchbaseExecutor`].
//!
//! [`CouchbaseExecutor`]: crate::CouchbaseExecutor

use std::time::Duration;

use async_trait::async_trait;
use tessera_core::{Result, Row};

use crate::query::{QueryRequest, QueryResponse};

/// A JSON document stored under a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonDocument {
	pub id: String,
	pub content: Row,
	/// Compare-and-swap token; `0` when unknown
	pub cas: u64,
	pub expiry: Option<Duration>,
}

impl JsonDocument {
	pub fn new(id: impl Into<String>, content: Row) -> Self {
		Self {
			id: id.into(),
			content,
			cas: 0,
			expiry: None,
		}
	}

	pub fn with_cas(mut self, cas: u64) -> Self {
		self.cas = cas;
		self
	}
}

/// N1QL query execution
#[async_trait]
pub trait QueryService: Send + Sync {
	async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;
}

/// Key/value access to one bucket
#[async_trait]
pub trait Bucket: Send + Sync {
	fn name(&self) -> &str;

	async fn get(&self, id: &str) -> Result<Option<JsonDocument>>;

	async fn exists(&self, id: &str) -> Result<bool>;

	/// Store a new document; fails when the key exists.
	async fn insert(&self, document: JsonDocument) -> Result<JsonDocument>;

	/// Store a document whether or not the key exists.
	async fn upsert(&self, document: JsonDocument) -> Result<JsonDocument>;

	/// Overwrite an existing document; fails when the key is absent.
	async fn replace(&self, document: JsonDocument) -> Result<JsonDocument>;

	/// Remove a document. Returns `false` when the key was absent.
	async fn remove(&self, id: &str) -> Result<bool>;
}

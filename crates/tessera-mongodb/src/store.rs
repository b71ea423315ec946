//! Document store seam
//!
//! [`DocumentStore`] is the narrow set of collection operations the
//! executor needs. The `driver` feature implements it over the official
//! driver; tests implement it in memory.

use async_trait::async_trait;
use bson::{Bson, Document};
use tessera_core::Result;

/// Backend name used in driver errors
pub const BACKEND: &str = "mongodb";

/// Options for [`DocumentStore::find_many`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
	pub limit: Option<i64>,
	pub skip: Option<u64>,
	/// Sort specification, e.g. `{ "created_at": -1 }`
	pub sort: Option<Document>,
	/// Projection, e.g. `{ "name": 1, "_id": 0 }`
	pub projection: Option<Document>,
	pub batch_size: Option<u32>,
}

impl FindOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn skip(mut self, skip: u64) -> Self {
		self.skip = Some(skip);
		self
	}

	pub fn sort(mut self, sort: Document) -> Self {
		self.sort = Some(sort);
		self
	}

	pub fn projection(mut self, projection: Document) -> Self {
		self.projection = Some(projection);
		self
	}

	pub fn batch_size(mut self, size: u32) -> Self {
		self.batch_size = Some(size);
		self
	}
}

/// Outcome of an update or replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
	pub matched_count: u64,
	pub modified_count: u64,
	/// `_id` of the document created by an upsert
	pub upserted_id: Option<Bson>,
}

impl UpdateResult {
	pub fn new(matched_count: u64, modified_count: u64, upserted_id: Option<Bson>) -> Self {
		Self {
			matched_count,
			modified_count,
			upserted_id,
		}
	}

	/// Whether the operation matched or created a document.
	pub fn affected(&self) -> bool {
		self.matched_count > 0 || self.upserted_id.is_some()
	}
}

/// Collection operations over raw documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
	async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> Result<Vec<Document>>;

	async fn count(&self, collection: &str, filter: Document) -> Result<u64>;

	/// Insert a document; returns its `_id`.
	async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;

	/// Insert documents in order; returns their `_id`s in the same order.
	async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<Vec<Bson>>;

	async fn replace_one(
		&self,
		collection: &str,
		filter: Document,
		replacement: Document,
		upsert: bool,
	) -> Result<UpdateResult>;

	async fn update_one(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult>;

	async fn update_many(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult>;

	/// Returns the number of deleted documents (0 or 1).
	async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64>;

	async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64>;

	async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>>;
}

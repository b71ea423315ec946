//! Native driver adapter
//!
//! [`MongoBackend`] implements [`DocumentStore`] over the official `mongodb`
//! driver. Pool sizing options are passed through to the driver's client.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera_mongodb::{MongoBackend, MongoExecutor};
//!
//! # async fn example() -> tessera_core::Result<()> {
//! let backend = MongoBackend::builder()
//!     .url("mongodb://localhost:27017")
//!     .database("library")
//!     .max_pool_size(50)
//!     .build()
//!     .await?;
//! let executor = MongoExecutor::new(Arc::new(backend))?;
//! let books = executor.collection("books");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tessera_core::{Error, Result};

use crate::store::{BACKEND, DocumentStore, FindOptions, UpdateResult};

fn driver_error(err: mongodb::error::Error) -> Error {
	Error::driver(BACKEND, err)
}

/// Builder for [`MongoBackend`]
#[derive(Debug, Clone)]
pub struct MongoBackendBuilder {
	url: String,
	database: String,
	max_pool_size: Option<u32>,
	min_pool_size: Option<u32>,
	max_idle_time: Option<Duration>,
	app_name: Option<String>,
}

impl Default for MongoBackendBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl MongoBackendBuilder {
	pub fn new() -> Self {
		Self {
			url: "mongodb://localhost:27017".to_string(),
			database: "test".to_string(),
			max_pool_size: None,
			min_pool_size: None,
			max_idle_time: None,
			app_name: None,
		}
	}

	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	pub fn database(mut self, database: impl Into<String>) -> Self {
		self.database = database.into();
		self
	}

	pub fn max_pool_size(mut self, size: u32) -> Self {
		self.max_pool_size = Some(size);
		self
	}

	pub fn min_pool_size(mut self, size: u32) -> Self {
		self.min_pool_size = Some(size);
		self
	}

	pub fn max_idle_time(mut self, idle: Duration) -> Self {
		self.max_idle_time = Some(idle);
		self
	}

	pub fn app_name(mut self, name: impl Into<String>) -> Self {
		self.app_name = Some(name.into());
		self
	}

	pub async fn build(self) -> Result<MongoBackend> {
		if let (Some(min), Some(max)) = (self.min_pool_size, self.max_pool_size)
			&& min > max
		{
			return Err(Error::Config(format!(
				"min_pool_size ({}) exceeds max_pool_size ({})",
				min, max
			)));
		}

		let mut options = ClientOptions::parse(&self.url)
			.await
			.map_err(|e| Error::Config(format!("invalid connection string: {}", e)))?;
		if let Some(size) = self.max_pool_size {
			options.max_pool_size = Some(size);
		}
		if let Some(size) = self.min_pool_size {
			options.min_pool_size = Some(size);
		}
		if let Some(idle) = self.max_idle_time {
			options.max_idle_time = Some(idle);
		}
		if let Some(name) = self.app_name {
			options.app_name = Some(name);
		}

		let client = Client::with_options(options).map_err(driver_error)?;
		tracing::debug!(database = %self.database, "mongodb client ready");
		Ok(MongoBackend {
			client: Arc::new(client),
			database: self.database,
		})
	}
}

/// Document store over a pooled driver client.
#[derive(Clone)]
pub struct MongoBackend {
	client: Arc<Client>,
	database: String,
}

impl std::fmt::Debug for MongoBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MongoBackend")
			.field("database", &self.database)
			.finish()
	}
}

impl MongoBackend {
	pub fn builder() -> MongoBackendBuilder {
		MongoBackendBuilder::new()
	}

	/// Connect with a connection string and the default database `test`.
	pub async fn connect(url: &str) -> Result<Self> {
		Self::builder().url(url).build().await
	}

	/// Same client, another database.
	pub fn with_database(mut self, database: &str) -> Self {
		self.database = database.to_string();
		self
	}

	pub fn database(&self) -> Database {
		self.client.database(&self.database)
	}

	/// Round trip a `ping` command.
	pub async fn health_check(&self) -> Result<()> {
		self.database()
			.run_command(bson::doc! { "ping": 1 })
			.await
			.map_err(driver_error)?;
		Ok(())
	}

	fn collection(&self, name: &str) -> Collection<Document> {
		self.database().collection::<Document>(name)
	}
}

fn update_result(result: mongodb::results::UpdateResult) -> UpdateResult {
	UpdateResult::new(result.matched_count, result.modified_count, result.upserted_id)
}

#[async_trait]
impl DocumentStore for MongoBackend {
	async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
		self.collection(collection)
			.find_one(filter)
			.await
			.map_err(driver_error)
	}

	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> Result<Vec<Document>> {
		let mut native = mongodb::options::FindOptions::default();
		native.limit = options.limit;
		native.skip = options.skip;
		native.sort = options.sort;
		native.projection = options.projection;
		native.batch_size = options.batch_size;

		let cursor = self
			.collection(collection)
			.find(filter)
			.with_options(native)
			.await
			.map_err(driver_error)?;
		cursor.try_collect().await.map_err(driver_error)
	}

	async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
		self.collection(collection)
			.count_documents(filter)
			.await
			.map_err(driver_error)
	}

	async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
		let result = self
			.collection(collection)
			.insert_one(document)
			.await
			.map_err(driver_error)?;
		Ok(result.inserted_id)
	}

	async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<Vec<Bson>> {
		let result = self
			.collection(collection)
			.insert_many(documents)
			.await
			.map_err(driver_error)?;
		let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
		ids.sort_by_key(|(index, _)| *index);
		Ok(ids.into_iter().map(|(_, id)| id).collect())
	}

	async fn replace_one(
		&self,
		collection: &str,
		filter: Document,
		replacement: Document,
		upsert: bool,
	) -> Result<UpdateResult> {
		self.collection(collection)
			.replace_one(filter, replacement)
			.upsert(upsert)
			.await
			.map(update_result)
			.map_err(driver_error)
	}

	async fn update_one(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult> {
		self.collection(collection)
			.update_one(filter, update)
			.await
			.map(update_result)
			.map_err(driver_error)
	}

	async fn update_many(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult> {
		self.collection(collection)
			.update_many(filter, update)
			.await
			.map(update_result)
			.map_err(driver_error)
	}

	async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
		let result = self
			.collection(collection)
			.delete_one(filter)
			.await
			.map_err(driver_error)?;
		Ok(result.deleted_count)
	}

	async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64> {
		let result = self
			.collection(collection)
			.delete_many(filter)
			.await
			.map_err(driver_error)?;
		Ok(result.deleted_count)
	}

	async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
		let cursor = self
			.collection(collection)
			.aggregate(pipeline)
			.await
			.map_err(driver_error)?;
		cursor.try_collect().await.map_err(driver_error)
	}
}

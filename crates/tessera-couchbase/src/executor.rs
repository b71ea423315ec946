//! N1QL executor
//!
//! [`CouchbaseExecutor`] maps entities onto JSON documents (identifier as
//! document key, remaining properties as the document body) and N1QL result
//! rows back onto entities or scalars.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tessera_core::mapper::{self, Record};
use tessera_core::{
	DEFAULT_ID_PROPERTY, Entity, EntityMeta, EntityRegistry, Error, ExecutorSettings,
	NamingPolicy, Result, Row, StatementCache, StatementCacheStats,
};

use crate::client::{Bucket, JsonDocument, QueryService};
use crate::params::QueryParams;
use crate::query::{QueryOptions, QueryRequest, QueryResponse};
use crate::statement::ParsedStatement;

/// Builder for [`CouchbaseExecutor`]
pub struct CouchbaseExecutorBuilder {
	bucket: Arc<dyn Bucket>,
	query_service: Arc<dyn QueryService>,
	settings: ExecutorSettings,
	registry: Option<Arc<EntityRegistry>>,
	default_options: QueryOptions,
}

impl CouchbaseExecutorBuilder {
	pub fn settings(mut self, settings: ExecutorSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn naming_policy(mut self, policy: NamingPolicy) -> Self {
		self.settings.naming_policy = policy;
		self
	}

	/// Share entity metadata with other executors.
	pub fn registry(mut self, registry: Arc<EntityRegistry>) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Options applied to queries that do not pass their own.
	pub fn default_options(mut self, options: QueryOptions) -> Self {
		self.default_options = options;
		self
	}

	pub fn build(self) -> Result<CouchbaseExecutor> {
		self.settings.validate()?;
		let statements = StatementCache::new(&self.settings.statement_cache)?;
		Ok(CouchbaseExecutor {
			bucket: self.bucket,
			query_service: self.query_service,
			registry: self.registry.unwrap_or_default(),
			policy: self.settings.naming_policy,
			statements: Arc::new(statements),
			default_options: self.default_options,
		})
	}
}

/// Entity executor over a Couchbase bucket and its query service.
///
/// Cloning is cheap; clones share the statement cache and entity registry.
#[derive(Clone)]
pub struct CouchbaseExecutor {
	bucket: Arc<dyn Bucket>,
	query_service: Arc<dyn QueryService>,
	registry: Arc<EntityRegistry>,
	policy: NamingPolicy,
	statements: Arc<StatementCache<ParsedStatement>>,
	default_options: QueryOptions,
}

impl std::fmt::Debug for CouchbaseExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CouchbaseExecutor")
			.field("bucket", &self.bucket.name())
			.field("policy", &self.policy)
			.field("statements", &self.statements)
			.finish()
	}
}

impl CouchbaseExecutor {
	pub fn builder(
		bucket: Arc<dyn Bucket>,
		query_service: Arc<dyn QueryService>,
	) -> CouchbaseExecutorBuilder {
		CouchbaseExecutorBuilder {
			bucket,
			query_service,
			settings: ExecutorSettings::default(),
			registry: None,
			default_options: QueryOptions::default(),
		}
	}

	/// Executor with default settings.
	pub fn new(bucket: Arc<dyn Bucket>, query_service: Arc<dyn QueryService>) -> Result<Self> {
		Self::builder(bucket, query_service).build()
	}

	pub fn bucket(&self) -> &Arc<dyn Bucket> {
		&self.bucket
	}

	pub fn naming_policy(&self) -> NamingPolicy {
		self.policy
	}

	pub fn registry(&self) -> &Arc<EntityRegistry> {
		&self.registry
	}

	fn meta<T: Entity>(&self) -> Result<Arc<EntityMeta>> {
		self.registry.meta::<T>(self.policy)
	}

	// Key/value operations

	pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
		let meta = self.meta::<T>()?;
		meta.require_id()?;
		match self.bucket.get(id).await? {
			Some(document) => document_to_entity(document, &meta).map(Some),
			None => Ok(None),
		}
	}

	/// Fetch several documents, skipping absent keys and keeping key order.
	pub async fn gets<T: Entity>(&self, ids: &[&str]) -> Result<Vec<T>> {
		let meta = self.meta::<T>()?;
		meta.require_id()?;
		let documents =
			futures::future::try_join_all(ids.iter().map(|id| self.bucket.get(id))).await?;
		documents
			.into_iter()
			.flatten()
			.map(|document| document_to_entity(document, &meta))
			.collect()
	}

	pub async fn exists(&self, id: &str) -> Result<bool> {
		self.bucket.exists(id).await
	}

	pub async fn insert<T: Entity>(&self, entity: &T) -> Result<JsonDocument> {
		let document = self.to_document(entity)?;
		self.bucket.insert(document).await
	}

	/// Insert every entity; all conversions happen before the first write.
	pub async fn insert_all<T: Entity>(&self, entities: &[T]) -> Result<Vec<JsonDocument>> {
		let documents = self.to_documents(entities)?;
		let mut stored = Vec::with_capacity(documents.len());
		for document in documents {
			stored.push(self.bucket.insert(document).await?);
		}
		Ok(stored)
	}

	pub async fn upsert<T: Entity>(&self, entity: &T) -> Result<JsonDocument> {
		let document = self.to_document(entity)?;
		self.bucket.upsert(document).await
	}

	pub async fn upsert_all<T: Entity>(&self, entities: &[T]) -> Result<Vec<JsonDocument>> {
		let documents = self.to_documents(entities)?;
		let mut stored = Vec::with_capacity(documents.len());
		for document in documents {
			stored.push(self.bucket.upsert(document).await?);
		}
		Ok(stored)
	}

	pub async fn replace<T: Entity>(&self, entity: &T) -> Result<JsonDocument> {
		let document = self.to_document(entity)?;
		self.bucket.replace(document).await
	}

	pub async fn remove(&self, id: &str) -> Result<bool> {
		self.bucket.remove(id).await
	}

	/// Remove the document stored for `entity`.
	pub async fn remove_entity<T: Entity>(&self, entity: &T) -> Result<bool> {
		let document = self.to_document(entity)?;
		self.bucket.remove(&document.id).await
	}

	/// Remove several documents; returns how many existed.
	pub async fn remove_all(&self, ids: &[&str]) -> Result<usize> {
		let mut removed = 0;
		for id in ids {
			if self.bucket.remove(id).await? {
				removed += 1;
			}
		}
		Ok(removed)
	}

	// Query operations

	/// Run a statement and map every row onto `T`.
	pub async fn query<T: Entity>(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<Vec<T>> {
		let meta = self.meta::<T>()?;
		let response = self.execute(statement, params).await?;
		response
			.rows
			.into_iter()
			.map(|row| row_to_entity(row, &meta))
			.collect()
	}

	/// Run a statement and decode every row into `V` (struct, map or scalar).
	pub async fn query_as<V: DeserializeOwned>(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<Vec<V>> {
		let response = self.execute(statement, params).await?;
		response
			.rows
			.into_iter()
			.map(|row| self.decode(row))
			.collect()
	}

	/// First row decoded into `V`, if any.
	///
	/// A row with a single column, or with the identifier plus one column,
	/// yields that column.
	pub async fn query_for_single<V: DeserializeOwned>(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<Option<V>> {
		let response = self.execute(statement, params).await?;
		response
			.rows
			.into_iter()
			.next()
			.map(|row| self.decode(row))
			.transpose()
	}

	/// Like [`query_for_single`](Self::query_for_single) but fails when the
	/// statement returns more than one row.
	pub async fn query_for_unique<V: DeserializeOwned>(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<Option<V>> {
		let response = self.execute(statement, params).await?;
		if response.rows.len() > 1 {
			return Err(Error::Conversion(format!(
				"expected at most one row, statement returned {}",
				response.rows.len()
			)));
		}
		response
			.rows
			.into_iter()
			.next()
			.map(|row| self.decode(row))
			.transpose()
	}

	pub async fn find_first<T: Entity>(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<Option<T>> {
		let meta = self.meta::<T>()?;
		let response = self.execute(statement, params).await?;
		response
			.rows
			.into_iter()
			.next()
			.map(|row| row_to_entity(row, &meta))
			.transpose()
	}

	/// Run a statement and convert rows lazily as the stream is polled.
	pub async fn stream<T: Entity>(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<BoxStream<'static, Result<T>>> {
		let meta = self.meta::<T>()?;
		let response = self.execute(statement, params).await?;
		Ok(stream::iter(response.rows)
			.map(move |row| row_to_entity(row, &meta))
			.boxed())
	}

	/// Run a statement with the default options and return the raw response.
	pub async fn execute(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
	) -> Result<QueryResponse> {
		self.execute_with_options(statement, params, self.default_options.clone())
			.await
	}

	/// Run a statement with explicit options and return the raw response.
	///
	/// A response with a non-success status is returned as [`Error::Driver`].
	pub async fn execute_with_options(
		&self,
		statement: &str,
		params: impl Into<QueryParams>,
		options: QueryOptions,
	) -> Result<QueryResponse> {
		let parsed = self
			.statements
			.get_or_parse(statement, ParsedStatement::parse)?;
		let params = parsed.bind(params.into())?;

		tracing::debug!(statement, bucket = self.bucket.name(), "executing N1QL statement");
		let request = QueryRequest {
			statement: parsed.statement().to_string(),
			params,
			options,
		};
		self.query_service.query(request).await?.error_for_status()
	}

	pub fn statement_cache_stats(&self) -> StatementCacheStats {
		self.statements.stats()
	}

	// Conversions

	/// Document for `entity`; the identifier becomes the document key.
	pub fn to_document<T: Entity>(&self, entity: &T) -> Result<JsonDocument> {
		let meta = self.meta::<T>()?;
		meta.require_id()?;
		let record = mapper::to_record(entity, &meta)?;
		let id = mapper::id_to_text(record.require_id(&meta)?)?;
		if id.is_empty() {
			return Err(Error::missing_id(meta.type_name()));
		}
		Ok(JsonDocument::new(id, record.fields))
	}

	/// Named parameters from the properties of `entity`, keyed by column.
	pub fn params_of<T: Entity>(&self, entity: &T) -> Result<QueryParams> {
		let meta = self.meta::<T>()?;
		QueryParams::from_entity(entity, &meta)
	}

	pub fn to_entity<T: Entity>(&self, document: JsonDocument) -> Result<T> {
		let meta = self.meta::<T>()?;
		document_to_entity(document, &meta)
	}

	/// Entity from a result row keyed by column name.
	pub fn row_to_entity<T: Entity>(&self, row: Row) -> Result<T> {
		let meta = self.meta::<T>()?;
		row_to_entity(Value::Object(row), &meta)
	}

	fn to_documents<T: Entity>(&self, entities: &[T]) -> Result<Vec<JsonDocument>> {
		entities.iter().map(|entity| self.to_document(entity)).collect()
	}

	fn decode<V: DeserializeOwned>(&self, row: Value) -> Result<V> {
		match row {
			Value::Object(row) => mapper::decode_row(row, Some(DEFAULT_ID_PROPERTY), self.policy),
			raw => mapper::convert_value(raw),
		}
	}
}

fn document_to_entity<T: Entity>(document: JsonDocument, meta: &EntityMeta) -> Result<T> {
	mapper::from_record_with_text_id(&document.id, document.content, meta)
}

fn row_to_entity<T: Entity>(row: Value, meta: &EntityMeta) -> Result<T> {
	let Value::Object(row) = row else {
		return Err(Error::Conversion(format!(
			"cannot map a {} row onto {}",
			mapper::value_kind(&row),
			meta.type_name()
		)));
	};
	let record = Record::from_row(row, meta);
	match record.id {
		Some(Value::String(id)) => mapper::from_record_with_text_id(&id, record.fields, meta),
		_ => mapper::from_record(record, meta),
	}
}

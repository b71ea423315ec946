//! Document executor
//!
//! [`MongoExecutor`] hands out [`CollectionExecutor`]s, each bound to one
//! collection of the underlying [`DocumentStore`].

use std::sync::Arc;

use bson::{Bson, Document, doc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tessera_core::{Entity, EntityMeta, EntityRegistry, ExecutorSettings, NamingPolicy, Result};

use crate::mapping::{self, ID_FIELD};
use crate::store::{DocumentStore, FindOptions, UpdateResult};

/// Builder for [`MongoExecutor`]
pub struct MongoExecutorBuilder {
	store: Arc<dyn DocumentStore>,
	settings: ExecutorSettings,
	registry: Option<Arc<EntityRegistry>>,
}

impl MongoExecutorBuilder {
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

	pub fn build(self) -> Result<MongoExecutor> {
		self.settings.validate()?;
		Ok(MongoExecutor {
			store: self.store,
			registry: self.registry.unwrap_or_default(),
			policy: self.settings.naming_policy,
		})
	}
}

/// Entity executor over a document store.
#[derive(Clone)]
pub struct MongoExecutor {
	store: Arc<dyn DocumentStore>,
	registry: Arc<EntityRegistry>,
	policy: NamingPolicy,
}

impl std::fmt::Debug for MongoExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MongoExecutor")
			.field("policy", &self.policy)
			.field("registry", &self.registry.len())
			.finish()
	}
}

impl MongoExecutor {
	pub fn builder(store: Arc<dyn DocumentStore>) -> MongoExecutorBuilder {
		MongoExecutorBuilder {
			store,
			settings: ExecutorSettings::default(),
			registry: None,
		}
	}

	/// Executor with default settings.
	pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self> {
		Self::builder(store).build()
	}

	pub fn naming_policy(&self) -> NamingPolicy {
		self.policy
	}

	pub fn registry(&self) -> &Arc<EntityRegistry> {
		&self.registry
	}

	pub fn store(&self) -> &Arc<dyn DocumentStore> {
		&self.store
	}

	/// Executor bound to `name`.
	pub fn collection(&self, name: impl Into<String>) -> CollectionExecutor {
		CollectionExecutor {
			executor: self.clone(),
			name: name.into(),
		}
	}

	/// Executor bound to the collection named after `T`.
	pub fn collection_for<T: Entity>(&self) -> Result<CollectionExecutor> {
		let meta = self.registry.meta::<T>(self.policy)?;
		Ok(self.collection(meta.name()))
	}
}

/// Entity operations on one collection.
#[derive(Debug, Clone)]
pub struct CollectionExecutor {
	executor: MongoExecutor,
	name: String,
}

impl CollectionExecutor {
	pub fn name(&self) -> &str {
		&self.name
	}

	fn store(&self) -> &dyn DocumentStore {
		self.executor.store.as_ref()
	}

	fn meta<T: Entity>(&self) -> Result<Arc<EntityMeta>> {
		self.executor.registry.meta::<T>(self.executor.policy)
	}

	// Reads

	/// Load the document with identifier `id`.
	pub async fn get<T: Entity, K: Serialize + ?Sized>(&self, id: &K) -> Result<Option<T>> {
		let meta = self.meta::<T>()?;
		meta.require_id()?;
		let filter = mapping::id_filter(mapping::key_of(id)?);
		match self.store().find_one(&self.name, filter).await? {
			Some(document) => mapping::to_entity(document, &meta).map(Some),
			None => Ok(None),
		}
	}

	/// Load several documents, skipping absent identifiers and keeping
	/// identifier order.
	pub async fn gets<T: Entity, K: Serialize>(&self, ids: &[K]) -> Result<Vec<T>> {
		let meta = self.meta::<T>()?;
		meta.require_id()?;
		let keys = ids.iter().map(mapping::key_of).collect::<Result<Vec<Bson>>>()?;
		let mut filter = Document::new();
		filter.insert(ID_FIELD, doc! { "$in": keys.clone() });

		let mut documents = self
			.store()
			.find_many(&self.name, filter, FindOptions::default())
			.await?;
		documents.sort_by_key(|document| {
			document
				.get(ID_FIELD)
				.and_then(|id| keys.iter().position(|key| mapping::same_key(id, key)))
				.unwrap_or(usize::MAX)
		});
		documents
			.into_iter()
			.map(|document| mapping::to_entity(document, &meta))
			.collect()
	}

	pub async fn exists<K: Serialize + ?Sized>(&self, id: &K) -> Result<bool> {
		let filter = mapping::id_filter(mapping::key_of(id)?);
		Ok(self.store().count(&self.name, filter).await? > 0)
	}

	pub async fn count(&self, filter: Document) -> Result<u64> {
		self.store().count(&self.name, filter).await
	}

	pub async fn find_first<T: Entity>(&self, filter: Document) -> Result<Option<T>> {
		let meta = self.meta::<T>()?;
		let documents = self
			.store()
			.find_many(&self.name, filter, FindOptions::new().limit(1))
			.await?;
		documents
			.into_iter()
			.next()
			.map(|document| mapping::to_entity(document, &meta))
			.transpose()
	}

	pub async fn list<T: Entity>(&self, filter: Document, options: FindOptions) -> Result<Vec<T>> {
		let meta = self.meta::<T>()?;
		let documents = self.store().find_many(&self.name, filter, options).await?;
		documents
			.into_iter()
			.map(|document| mapping::to_entity(document, &meta))
			.collect()
	}

	/// Find documents and convert them lazily as the stream is polled.
	pub async fn stream<T: Entity>(
		&self,
		filter: Document,
		options: FindOptions,
	) -> Result<BoxStream<'static, Result<T>>> {
		let meta = self.meta::<T>()?;
		let documents = self.store().find_many(&self.name, filter, options).await?;
		Ok(stream::iter(documents)
			.map(move |document| mapping::to_entity(document, &meta))
			.boxed())
	}

	/// One field of the first matching document.
	///
	/// `field` is a stored field name (already translated by the naming
	/// policy), or `_id`.
	pub async fn query_for_single<V: DeserializeOwned>(
		&self,
		filter: Document,
		field: &str,
	) -> Result<Option<V>> {
		let mut projection = Document::new();
		projection.insert(field, 1);
		if field != ID_FIELD {
			projection.insert(ID_FIELD, 0);
		}
		let options = FindOptions::new().limit(1).projection(projection);
		let documents = self.store().find_many(&self.name, filter, options).await?;
		documents
			.into_iter()
			.next()
			.map(|mut document| {
				if field != ID_FIELD {
					document.remove(ID_FIELD);
				}
				mapping::decode_scalar(document)
			})
			.transpose()
	}

	/// Run a pipeline and decode every output document into `V` (struct,
	/// map or scalar).
	pub async fn aggregate<V: DeserializeOwned>(&self, pipeline: Vec<Document>) -> Result<Vec<V>> {
		let documents = self.store().aggregate(&self.name, pipeline).await?;
		documents
			.into_iter()
			.map(|document| mapping::decode_document(document, self.executor.policy))
			.collect()
	}

	// Writes

	/// Insert `entity`; returns the stored `_id`.
	pub async fn insert<T: Entity>(&self, entity: &T) -> Result<Bson> {
		let document = self.to_document(entity)?;
		self.store().insert_one(&self.name, document).await
	}

	/// Insert every entity; all conversions happen before the write.
	pub async fn insert_all<T: Entity>(&self, entities: &[T]) -> Result<Vec<Bson>> {
		if entities.is_empty() {
			return Ok(Vec::new());
		}
		let documents = self.to_documents(entities)?;
		self.store().insert_many(&self.name, documents).await
	}

	/// `$set` every property of `entity` on its stored document.
	pub async fn update<T: Entity>(&self, entity: &T) -> Result<UpdateResult> {
		let mut document = self.to_document(entity)?;
		let id = document.remove(ID_FIELD).unwrap_or(Bson::Null);
		let update = doc! { "$set": document };
		self.store()
			.update_one(&self.name, mapping::id_filter(id), update)
			.await
	}

	/// Replace the stored document of `entity`.
	pub async fn replace<T: Entity>(&self, entity: &T) -> Result<UpdateResult> {
		self.replace_document(entity, false).await
	}

	/// Replace the stored document of `entity`, inserting it when absent.
	pub async fn upsert<T: Entity>(&self, entity: &T) -> Result<UpdateResult> {
		self.replace_document(entity, true).await
	}

	async fn replace_document<T: Entity>(&self, entity: &T, upsert: bool) -> Result<UpdateResult> {
		let document = self.to_document(entity)?;
		let id = document.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
		self.store()
			.replace_one(&self.name, mapping::id_filter(id), document, upsert)
			.await
	}

	/// Delete the document with identifier `id`.
	pub async fn delete<K: Serialize + ?Sized>(&self, id: &K) -> Result<bool> {
		let filter = mapping::id_filter(mapping::key_of(id)?);
		Ok(self.store().delete_one(&self.name, filter).await? > 0)
	}

	/// Delete the stored document of `entity`.
	pub async fn delete_entity<T: Entity>(&self, entity: &T) -> Result<bool> {
		let document = self.to_document(entity)?;
		let id = document.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
		Ok(self
			.store()
			.delete_one(&self.name, mapping::id_filter(id))
			.await? > 0)
	}

	/// Delete every matching document; returns how many were deleted.
	pub async fn delete_all(&self, filter: Document) -> Result<u64> {
		self.store().delete_many(&self.name, filter).await
	}

	// Conversions

	pub fn to_document<T: Entity>(&self, entity: &T) -> Result<Document> {
		let meta = self.meta::<T>()?;
		mapping::to_document(entity, &meta)
	}

	pub fn to_entity<T: Entity>(&self, document: Document) -> Result<T> {
		let meta = self.meta::<T>()?;
		mapping::to_entity(document, &meta)
	}

	fn to_documents<T: Entity>(&self, entities: &[T]) -> Result<Vec<Document>> {
		let meta = self.meta::<T>()?;
		entities
			.iter()
			.map(|entity| mapping::to_document(entity, &meta))
			.collect()
	}
}

//! Column-family executor
//!
//! [`HBaseExecutor`] maps entities onto rows of the table named after the
//! entity ([`Entity::NAME`], else the struct name). See [`crate::mapping`]
//! for how properties become cells.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use tessera_core::{Entity, EntityRegistry, ExecutorSettings, NamingPolicy, Result};

use crate::any::{AnyAppend, AnyGet, AnyIncrement, AnyScan};
use crate::codec::{CellCodec, CellKey};
use crate::layout::EntityLayout;
use crate::mapping::ColumnMapping;
use crate::model::{ALL_VERSIONS, Delete, Get, Put, RowResult};
use crate::table::{Table, TableProvider};

/// Builder for [`HBaseExecutor`]
pub struct HBaseExecutorBuilder {
	provider: Arc<dyn TableProvider>,
	settings: ExecutorSettings,
	registry: Option<Arc<EntityRegistry>>,
}

impl HBaseExecutorBuilder {
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

	pub fn build(self) -> Result<HBaseExecutor> {
		self.settings.validate()?;
		Ok(HBaseExecutor {
			provider: self.provider,
			registry: self.registry.unwrap_or_default(),
			policy: self.settings.naming_policy,
			mappings: Arc::new(DashMap::new()),
		})
	}
}

/// Entity executor over HBase tables.
///
/// Cloning is cheap; clones share the resolved column mappings.
#[derive(Clone)]
pub struct HBaseExecutor {
	provider: Arc<dyn TableProvider>,
	registry: Arc<EntityRegistry>,
	policy: NamingPolicy,
	mappings: Arc<DashMap<TypeId, Arc<ColumnMapping>>>,
}

impl std::fmt::Debug for HBaseExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HBaseExecutor")
			.field("policy", &self.policy)
			.field("mappings", &self.mappings.len())
			.finish()
	}
}

impl HBaseExecutor {
	pub fn builder(provider: Arc<dyn TableProvider>) -> HBaseExecutorBuilder {
		HBaseExecutorBuilder {
			provider,
			settings: ExecutorSettings::default(),
			registry: None,
		}
	}

	/// Executor with default settings.
	pub fn new(provider: Arc<dyn TableProvider>) -> Result<Self> {
		Self::builder(provider).build()
	}

	pub fn naming_policy(&self) -> NamingPolicy {
		self.policy
	}

	pub fn registry(&self) -> &Arc<EntityRegistry> {
		&self.registry
	}

	/// Raw access to a table.
	pub fn table(&self, name: &str) -> Result<Arc<dyn Table>> {
		self.provider.table(name)
	}

	/// Column mapping of `T`, rebuilt whenever the registry hands out new
	/// metadata for it.
	pub fn column_mapping<T: Entity>(&self) -> Result<Arc<ColumnMapping>> {
		let meta = self.registry.meta::<T>(self.policy)?;
		if let Some(mapping) = self.mappings.get(&TypeId::of::<T>())
			&& Arc::ptr_eq(mapping.meta(), &meta)
		{
			return Ok(mapping.clone());
		}
		let mapping = Arc::new(ColumnMapping::new(meta, EntityLayout::of::<T>()));
		tracing::debug!(entity = std::any::type_name::<T>(), "resolved column mapping");
		self.mappings.insert(TypeId::of::<T>(), mapping.clone());
		Ok(mapping)
	}

	fn table_of(&self, mapping: &ColumnMapping) -> Result<Arc<dyn Table>> {
		self.provider.table(mapping.meta().name())
	}

	fn entity_get(mapping: &ColumnMapping, row: bytes::Bytes) -> Get {
		let versions = if mapping.layout().reads_all_versions() {
			ALL_VERSIONS
		} else {
			1
		};
		Get::new(row).max_versions(versions)
	}

	// Reads

	pub async fn get<T: Entity>(&self, id: impl CellKey) -> Result<Option<T>> {
		let mapping = self.column_mapping::<T>()?;
		mapping.meta().require_id()?;
		let get = Self::entity_get(&mapping, id.to_key_bytes());
		let result = self.table_of(&mapping)?.get(get).await?;
		mapping.to_entity(&result)
	}

	/// Read with caller-chosen columns, versions or time range.
	pub async fn get_with<T: Entity>(&self, get: AnyGet) -> Result<Option<T>> {
		let mapping = self.column_mapping::<T>()?;
		mapping.meta().require_id()?;
		let result = self.table_of(&mapping)?.get(get.into_inner()).await?;
		mapping.to_entity(&result)
	}

	/// Fetch several rows, skipping absent ones and keeping key order.
	pub async fn gets<T: Entity, K: CellKey>(&self, ids: &[K]) -> Result<Vec<T>> {
		let mapping = self.column_mapping::<T>()?;
		mapping.meta().require_id()?;
		let gets = ids
			.iter()
			.map(|id| Self::entity_get(&mapping, id.to_key_bytes()))
			.collect();
		let results = self.table_of(&mapping)?.get_many(gets).await?;
		let mut entities = Vec::with_capacity(results.len());
		for result in &results {
			if let Some(entity) = mapping.to_entity(result)? {
				entities.push(entity);
			}
		}
		Ok(entities)
	}

	pub async fn exists<T: Entity>(&self, id: impl CellKey) -> Result<bool> {
		let mapping = self.column_mapping::<T>()?;
		self.table_of(&mapping)?
			.exists(Get::new(id.to_key_bytes()))
			.await
	}

	pub async fn scan<T: Entity>(&self, scan: AnyScan) -> Result<Vec<T>> {
		let mapping = self.column_mapping::<T>()?;
		mapping.meta().require_id()?;
		let results = self.table_of(&mapping)?.scan(scan.into_inner()).await?;
		let mut entities = Vec::with_capacity(results.len());
		for result in &results {
			if let Some(entity) = mapping.to_entity(result)? {
				entities.push(entity);
			}
		}
		Ok(entities)
	}

	/// Every row whose key starts with `prefix`.
	pub async fn scan_prefix<T: Entity>(&self, prefix: impl CellKey) -> Result<Vec<T>> {
		let mapping = self.column_mapping::<T>()?;
		let scan = if mapping.layout().reads_all_versions() {
			AnyScan::with_prefix(prefix).max_versions(ALL_VERSIONS)
		} else {
			AnyScan::with_prefix(prefix)
		};
		self.scan(scan).await
	}

	// Writes

	pub async fn put<T: Entity>(&self, entity: &T) -> Result<()> {
		let mapping = self.column_mapping::<T>()?;
		let put = mapping.to_put(entity)?;
		self.table_of(&mapping)?.put(put).await
	}

	/// Store every entity; all conversions happen before the first write.
	pub async fn put_all<T: Entity>(&self, entities: &[T]) -> Result<()> {
		let mapping = self.column_mapping::<T>()?;
		let puts = entities
			.iter()
			.map(|entity| mapping.to_put(entity))
			.collect::<Result<Vec<_>>>()?;
		self.table_of(&mapping)?.put_many(puts).await
	}

	/// Delete the row of `id`.
	pub async fn delete<T: Entity>(&self, id: impl CellKey) -> Result<()> {
		let mapping = self.column_mapping::<T>()?;
		self.table_of(&mapping)?
			.delete(Delete::new(id.to_key_bytes()))
			.await
	}

	/// Delete the row stored for `entity`.
	pub async fn delete_entity<T: Entity>(&self, entity: &T) -> Result<()> {
		let mapping = self.column_mapping::<T>()?;
		let put = mapping.to_put(entity)?;
		self.table_of(&mapping)?.delete(Delete::new(put.row)).await
	}

	pub async fn delete_all<T: Entity, K: CellKey>(&self, ids: &[K]) -> Result<()> {
		let mapping = self.column_mapping::<T>()?;
		let deletes = ids
			.iter()
			.map(|id| Delete::new(id.to_key_bytes()))
			.collect();
		self.table_of(&mapping)?.delete_many(deletes).await
	}

	/// Apply counter increments on the table of `T`.
	pub async fn increment<T: Entity>(&self, increment: AnyIncrement) -> Result<RowResult> {
		let mapping = self.column_mapping::<T>()?;
		self.table_of(&mapping)?
			.increment(increment.into_inner())
			.await
	}

	/// Increment one counter cell and return its new value.
	pub async fn increment_column<T: Entity>(
		&self,
		row: impl CellKey,
		family: impl CellKey,
		qualifier: impl CellKey,
		amount: i64,
	) -> Result<i64> {
		let family = family.to_key_bytes();
		let qualifier = qualifier.to_key_bytes();
		let increment = AnyIncrement::new(row).add_column(family.clone(), qualifier.clone(), amount);
		let result = self.increment::<T>(increment).await?;
		match result.value(&family, &qualifier) {
			Some(value) => CellCodec::decode_counter(value),
			None => Ok(amount),
		}
	}

	/// Append to cell values on the table of `T`.
	pub async fn append<T: Entity>(&self, append: AnyAppend) -> Result<RowResult> {
		let mapping = self.column_mapping::<T>()?;
		self.table_of(&mapping)?.append(append.into_inner()).await
	}

	// Conversions

	pub fn to_put<T: Entity>(&self, entity: &T) -> Result<Put> {
		self.column_mapping::<T>()?.to_put(entity)
	}

	/// Entity from a row; `None` for an empty result.
	pub fn to_entity<T: Entity>(&self, result: &RowResult) -> Result<Option<T>> {
		self.column_mapping::<T>()?.to_entity(result)
	}
}

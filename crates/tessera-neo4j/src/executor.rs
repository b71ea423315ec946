//! Graph executor
//!
//! [`Neo4jExecutor`] stores each entity as one node labelled with the
//! entity name and keyed by its identifier property. Sessions are borrowed
//! from a [`SessionQueue`] for the duration of one statement.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tessera_core::mapper;
use tessera_core::{Entity, EntityMeta, EntityRegistry, ExecutorSettings, NamingPolicy, Result, Row};

use crate::cypher::{self, NODE};
use crate::mapping;
use crate::queue::{DEFAULT_IDLE_SESSIONS, SessionQueue};
use crate::session::SessionFactory;

/// Builder for [`Neo4jExecutor`]
pub struct Neo4jExecutorBuilder {
	factory: Arc<dyn SessionFactory>,
	settings: ExecutorSettings,
	registry: Option<Arc<EntityRegistry>>,
	idle_sessions: usize,
}

impl Neo4jExecutorBuilder {
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

	/// Maximum number of idle sessions kept for reuse.
	pub fn idle_sessions(mut self, count: usize) -> Self {
		self.idle_sessions = count;
		self
	}

	pub fn build(self) -> Result<Neo4jExecutor> {
		self.settings.validate()?;
		let sessions = SessionQueue::new(self.factory, self.idle_sessions)?;
		Ok(Neo4jExecutor {
			sessions: Arc::new(sessions),
			registry: self.registry.unwrap_or_default(),
			policy: self.settings.naming_policy,
		})
	}
}

/// Entity executor over graph sessions.
#[derive(Clone)]
pub struct Neo4jExecutor {
	sessions: Arc<SessionQueue>,
	registry: Arc<EntityRegistry>,
	policy: NamingPolicy,
}

impl std::fmt::Debug for Neo4jExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Neo4jExecutor")
			.field("sessions", &self.sessions)
			.field("policy", &self.policy)
			.finish()
	}
}

impl Neo4jExecutor {
	pub fn builder(factory: Arc<dyn SessionFactory>) -> Neo4jExecutorBuilder {
		Neo4jExecutorBuilder {
			factory,
			settings: ExecutorSettings::default(),
			registry: None,
			idle_sessions: DEFAULT_IDLE_SESSIONS,
		}
	}

	/// Executor with default settings.
	pub fn new(factory: Arc<dyn SessionFactory>) -> Result<Self> {
		Self::builder(factory).build()
	}

	pub fn naming_policy(&self) -> NamingPolicy {
		self.policy
	}

	pub fn registry(&self) -> &Arc<EntityRegistry> {
		&self.registry
	}

	pub fn sessions(&self) -> &Arc<SessionQueue> {
		&self.sessions
	}

	fn meta<T: Entity>(&self) -> Result<Arc<EntityMeta>> {
		self.registry.meta::<T>(self.policy)
	}

	/// Run one statement on a borrowed session.
	///
	/// A session whose statement fails is not handed back to the queue.
	async fn run(&self, statement: &str, params: Row) -> Result<Vec<Row>> {
		tracing::debug!(statement, "running cypher statement");
		let mut session = self.sessions.acquire().await?;
		match session.run(statement, params).await {
			Ok(rows) => Ok(rows),
			Err(e) => {
				session.poison();
				Err(e)
			}
		}
	}

	async fn run_count(&self, statement: &str, params: Row, column: &str) -> Result<u64> {
		let rows = self.run(statement, params).await?;
		match rows.into_iter().next() {
			Some(mut row) => mapper::convert_value(row.remove(column).unwrap_or(Value::Null)),
			None => Ok(0),
		}
	}

	fn nodes<T: Entity>(rows: Vec<Row>, meta: &EntityMeta) -> Result<Vec<T>> {
		rows.into_iter()
			.map(|row| mapping::from_node(mapping::node_in(row, NODE)?, meta))
			.collect()
	}

	// Reads

	/// Load the node with identifier `id`.
	pub async fn load<T: Entity, K: Serialize + ?Sized>(&self, id: &K) -> Result<Option<T>> {
		let meta = self.meta::<T>()?;
		let id_key = id_key_of(&meta)?;
		let statement = cypher::match_by_id(meta.name(), id_key);
		let rows = self.run(&statement, id_params(mapping::key_of(id, &meta)?)).await?;
		Ok(Self::nodes(rows, &meta)?.into_iter().next())
	}

	/// Load several nodes, skipping absent identifiers and keeping
	/// identifier order.
	pub async fn load_all<T: Entity, K: Serialize>(&self, ids: &[K]) -> Result<Vec<T>> {
		let meta = self.meta::<T>()?;
		let id_key = id_key_of(&meta)?;
		if ids.is_empty() {
			return Ok(Vec::new());
		}
		let keys = ids
			.iter()
			.map(|id| mapping::key_of(id, &meta))
			.collect::<Result<Vec<Value>>>()?;

		let mut params = Row::new();
		params.insert("ids".to_string(), Value::Array(keys.clone()));
		let rows = self.run(&cypher::match_by_ids(meta.name(), id_key), params).await?;

		let mut nodes = rows
			.into_iter()
			.map(|row| mapping::node_in(row, NODE))
			.collect::<Result<Vec<Row>>>()?;
		nodes.sort_by_key(|node| {
			keys.iter()
				.position(|key| node.get(id_key) == Some(key))
				.unwrap_or(usize::MAX)
		});
		nodes
			.into_iter()
			.map(|node| mapping::from_node(node, &meta))
			.collect()
	}

	/// Load every node carrying `label`.
	pub async fn load_by_label<T: Entity>(&self, label: &str) -> Result<Vec<T>> {
		let meta = self.meta::<T>()?;
		let rows = self.run(&cypher::match_label(label), Row::new()).await?;
		Self::nodes(rows, &meta)
	}

	/// Number of nodes labelled with `T`'s name.
	pub async fn count<T: Entity>(&self) -> Result<u64> {
		let meta = self.meta::<T>()?;
		self.run_count(&cypher::count_label(meta.name()), Row::new(), "count")
			.await
	}

	// Writes

	/// Create or update the node of `entity`, replacing all its properties.
	pub async fn save<T: Entity>(&self, entity: &T) -> Result<()> {
		let meta = self.meta::<T>()?;
		let id_key = id_key_of(&meta)?;
		let node = mapping::to_node(entity, &meta)?;

		let mut params = id_params(node.id);
		params.insert("props".to_string(), Value::Object(node.properties));
		self.run(&cypher::merge(meta.name(), id_key), params).await?;
		Ok(())
	}

	/// Save every entity in one statement; all conversions happen before it
	/// runs.
	pub async fn save_all<T: Entity>(&self, entities: &[T]) -> Result<()> {
		let meta = self.meta::<T>()?;
		let id_key = id_key_of(&meta)?;
		if entities.is_empty() {
			return Ok(());
		}
		let rows = entities
			.iter()
			.map(|entity| mapping::to_node(entity, &meta).map(mapping::NodeProperties::into_batch_row))
			.collect::<Result<Vec<Value>>>()?;

		let mut params = Row::new();
		params.insert("rows".to_string(), Value::Array(rows));
		self.run(&cypher::merge_all(meta.name(), id_key), params).await?;
		Ok(())
	}

	/// Delete the node of `entity` and its relationships.
	pub async fn delete<T: Entity>(&self, entity: &T) -> Result<bool> {
		let meta = self.meta::<T>()?;
		let node = mapping::to_node(entity, &meta)?;
		self.delete_key(&meta, node.id).await
	}

	/// Delete the `T` node with identifier `id`.
	pub async fn delete_by_id<T: Entity, K: Serialize + ?Sized>(&self, id: &K) -> Result<bool> {
		let meta = self.meta::<T>()?;
		let key = mapping::key_of(id, &meta)?;
		self.delete_key(&meta, key).await
	}

	async fn delete_key(&self, meta: &EntityMeta, key: Value) -> Result<bool> {
		let statement = cypher::delete_by_id(meta.name(), id_key_of(meta)?);
		let deleted = self.run_count(&statement, id_params(key), "deleted").await?;
		Ok(deleted > 0)
	}

	/// Delete every node labelled with `T`'s name; returns how many were
	/// deleted.
	pub async fn delete_all<T: Entity>(&self) -> Result<u64> {
		let meta = self.meta::<T>()?;
		self.run_count(&cypher::delete_label(meta.name()), Row::new(), "deleted")
			.await
	}

	// Queries

	/// Run `statement` and decode every row into `V`.
	///
	/// A row holding a single node is decoded from the node's properties.
	pub async fn query<V: DeserializeOwned>(&self, statement: &str, params: Row) -> Result<Vec<V>> {
		let rows = self.run(statement, params).await?;
		rows.into_iter().map(|row| self.decode(row)).collect()
	}

	/// First row of `statement` decoded into `V`.
	pub async fn query_for_single<V: DeserializeOwned>(
		&self,
		statement: &str,
		params: Row,
	) -> Result<Option<V>> {
		let rows = self.run(statement, params).await?;
		rows.into_iter().next().map(|row| self.decode(row)).transpose()
	}

	/// Run `statement` and return the raw rows.
	pub async fn execute(&self, statement: &str, params: Row) -> Result<Vec<Row>> {
		self.run(statement, params).await
	}

	fn decode<V: DeserializeOwned>(&self, row: Row) -> Result<V> {
		let row = match single_object(row) {
			Ok(properties) => properties,
			Err(row) => row,
		};
		mapper::decode_row(row, None, self.policy)
	}

	// Conversions

	pub fn to_node<T: Entity>(&self, entity: &T) -> Result<mapping::NodeProperties> {
		let meta = self.meta::<T>()?;
		mapping::to_node(entity, &meta)
	}

	pub fn from_node<T: Entity>(&self, properties: Row) -> Result<T> {
		let meta = self.meta::<T>()?;
		mapping::from_node(properties, &meta)
	}
}

fn id_key_of(meta: &EntityMeta) -> Result<&str> {
	meta.require_id()?;
	Ok(meta.id_column().unwrap_or(tessera_core::DEFAULT_ID_PROPERTY))
}

fn id_params(id: Value) -> Row {
	let mut params = Row::new();
	params.insert("id".to_string(), id);
	params
}

fn single_object(mut row: Row) -> std::result::Result<Row, Row> {
	if row.len() != 1 {
		return Err(row);
	}
	let key = row.keys().next().cloned().unwrap_or_default();
	match row.remove(&key) {
		Some(Value::Object(properties)) => Ok(properties),
		Some(value) => {
			row.insert(key, value);
			Err(row)
		}
		None => Err(row),
	}
}

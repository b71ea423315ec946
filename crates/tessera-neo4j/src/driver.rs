//! Bolt driver adapter
//!
//! [`BoltSessionFactory`] opens [`GraphSession`]s over a pooled `neo4rs`
//! graph. Parameters are converted from JSON to Bolt values; result rows are
//! deserialized back into JSON objects.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, query};
use serde_json::Value;
use tessera_core::{Error, Result, Row};

use crate::session::{BACKEND, GraphSession, SessionFactory};

fn driver_error(err: neo4rs::Error) -> Error {
	Error::driver(BACKEND, err)
}

/// Connection settings for [`BoltSessionFactory`]
#[derive(Clone)]
pub struct BoltConfig {
	pub uri: String,
	pub user: String,
	pub password: String,
	pub database: Option<String>,
	pub fetch_size: Option<usize>,
	pub max_connections: Option<usize>,
}

impl std::fmt::Debug for BoltConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BoltConfig")
			.field("uri", &self.uri)
			.field("user", &self.user)
			.field("password", &"***")
			.field("database", &self.database)
			.field("fetch_size", &self.fetch_size)
			.field("max_connections", &self.max_connections)
			.finish()
	}
}

impl BoltConfig {
	pub fn new(uri: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			uri: uri.into(),
			user: user.into(),
			password: password.into(),
			database: None,
			fetch_size: None,
			max_connections: None,
		}
	}

	pub fn database(mut self, database: impl Into<String>) -> Self {
		self.database = Some(database.into());
		self
	}

	pub fn fetch_size(mut self, size: usize) -> Self {
		self.fetch_size = Some(size);
		self
	}

	pub fn max_connections(mut self, count: usize) -> Self {
		self.max_connections = Some(count);
		self
	}
}

/// Session factory over one connected graph.
#[derive(Clone)]
pub struct BoltSessionFactory {
	graph: Arc<Graph>,
}

impl std::fmt::Debug for BoltSessionFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BoltSessionFactory").finish_non_exhaustive()
	}
}

impl BoltSessionFactory {
	pub async fn connect(config: BoltConfig) -> Result<Self> {
		let mut builder = ConfigBuilder::default()
			.uri(config.uri.as_str())
			.user(config.user.as_str())
			.password(config.password.as_str());
		if let Some(database) = &config.database {
			builder = builder.db(database.as_str());
		}
		if let Some(size) = config.fetch_size {
			builder = builder.fetch_size(size);
		}
		if let Some(count) = config.max_connections {
			builder = builder.max_connections(count);
		}
		let native = builder
			.build()
			.map_err(|e| Error::Config(format!("invalid bolt configuration: {}", e)))?;

		let graph = Graph::connect(native).await.map_err(driver_error)?;
		tracing::debug!(uri = %config.uri, "bolt graph connected");
		Ok(Self {
			graph: Arc::new(graph),
		})
	}
}

#[async_trait]
impl SessionFactory for BoltSessionFactory {
	async fn open(&self) -> Result<Box<dyn GraphSession>> {
		Ok(Box::new(BoltSession {
			graph: self.graph.clone(),
		}))
	}
}

struct BoltSession {
	graph: Arc<Graph>,
}

#[async_trait]
impl GraphSession for BoltSession {
	async fn run(&self, cypher: &str, params: Row) -> Result<Vec<Row>> {
		let mut statement = query(cypher);
		for (key, value) in params {
			statement = statement.param(key.as_str(), bolt_value(value));
		}

		let mut stream = self.graph.execute(statement).await.map_err(driver_error)?;
		let mut rows = Vec::new();
		while let Some(row) = stream.next().await.map_err(driver_error)? {
			let row: Row = row
				.to()
				.map_err(|e| Error::Conversion(format!("cannot read bolt row: {}", e)))?;
			rows.push(row);
		}
		Ok(rows)
	}
}

/// Bolt value of a JSON parameter.
fn bolt_value(value: Value) -> BoltType {
	match value {
		Value::Null => BoltType::Null(BoltNull),
		Value::Bool(flag) => BoltType::from(flag),
		Value::Number(number) => match number.as_i64() {
			Some(int) => BoltType::from(int),
			None => BoltType::from(number.as_f64().unwrap_or(f64::NAN)),
		},
		Value::String(text) => BoltType::from(text),
		Value::Array(items) => BoltType::List(BoltList {
			value: items.into_iter().map(bolt_value).collect(),
		}),
		Value::Object(entries) => {
			let value: HashMap<BoltString, BoltType> = entries
				.into_iter()
				.map(|(key, value)| (BoltString::new(&key), bolt_value(value)))
				.collect();
			BoltType::Map(BoltMap { value })
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_bolt_values() {
		assert!(matches!(bolt_value(Value::Null), BoltType::Null(_)));
		assert!(matches!(bolt_value(json!(42)), BoltType::Integer(_)));
		assert!(matches!(bolt_value(json!(1.5)), BoltType::Float(_)));
		assert!(matches!(bolt_value(json!("x")), BoltType::String(_)));

		match bolt_value(json!({ "tags": ["a", "b"] })) {
			BoltType::Map(map) => {
				let tags = map.value.get(&BoltString::new("tags"));
				assert!(matches!(tags, Some(BoltType::List(list)) if list.value.len() == 2));
			}
			other => panic!("expected a map, got {:?}", other),
		}
	}

	#[rstest]
	fn test_config_hides_password() {
		let config = BoltConfig::new("bolt://localhost:7687", "neo4j", "secret")
			.database("people")
			.max_connections(4);
		let rendered = format!("{:?}", config);
		assert!(!rendered.contains("secret"));
		assert!(rendered.contains("people"));
	}
}

//! Entity <-> node mapping.
//!
//! Every property, the identifier included, becomes a node property named
//! by the naming policy. Node properties must be flat: scalars and lists
//! of scalars only.

use serde::Serialize;
use serde_json::Value;
use tessera_core::mapper::{self, Record};
use tessera_core::{Entity, EntityMeta, Error, Result, Row};

/// A node ready to be merged: identifier and full property map.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProperties {
	pub id: Value,
	pub properties: Row,
}

impl NodeProperties {
	/// `{id, props}` entry of a batched merge.
	pub fn into_batch_row(self) -> Value {
		let mut row = Row::new();
		row.insert("id".to_string(), self.id);
		row.insert("props".to_string(), Value::Object(self.properties));
		Value::Object(row)
	}
}

/// Check that `value` can be stored as a node property.
pub fn check_property(entity: &str, column: &str, value: &Value) -> Result<()> {
	let nested = match value {
		Value::Object(_) => true,
		Value::Array(items) => items
			.iter()
			.any(|item| matches!(item, Value::Object(_) | Value::Array(_))),
		_ => false,
	};
	if nested {
		return Err(Error::UnsupportedType(format!(
			"{}.{} is nested; node properties must be scalars or lists of scalars",
			entity, column
		)));
	}
	Ok(())
}

/// Identifier value usable as a node key.
pub fn node_key(id: Value, meta: &EntityMeta) -> Result<Value> {
	match id {
		Value::Null => Err(Error::missing_id(meta.type_name())),
		Value::String(text) if text.is_empty() => Err(Error::missing_id(meta.type_name())),
		id @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => Ok(id),
		other => Err(Error::InvalidArgument(format!(
			"{} cannot be used as a node identifier",
			mapper::value_kind(&other)
		))),
	}
}

/// Node key of any serializable identifier.
pub fn key_of<K: Serialize + ?Sized>(id: &K, meta: &EntityMeta) -> Result<Value> {
	node_key(serde_json::to_value(id)?, meta)
}

pub fn to_node<T: Entity>(entity: &T, meta: &EntityMeta) -> Result<NodeProperties> {
	meta.require_id()?;
	let record = mapper::to_record(entity, meta)?;
	for (column, value) in &record.fields {
		check_property(meta.type_name(), column, value)?;
	}
	let id = node_key(record.id.clone().unwrap_or(Value::Null), meta)?;
	Ok(NodeProperties {
		id,
		properties: record.into_row(meta),
	})
}

pub fn from_node<T: Entity>(properties: Row, meta: &EntityMeta) -> Result<T> {
	mapper::from_record(Record::from_row(properties, meta), meta)
}

/// Property map held in `column` of a result row.
pub fn node_in(mut row: Row, column: &str) -> Result<Row> {
	match row.remove(column) {
		Some(Value::Object(properties)) => Ok(properties),
		Some(other) => Err(Error::Conversion(format!(
			"expected a node in column {}, found {}",
			column,
			mapper::value_kind(&other)
		))),
		None => Err(Error::Conversion(format!("result row has no column {}", column))),
	}
}

/// Named parameters from any serializable value that serializes to a map.
pub fn params_of<P: Serialize + ?Sized>(params: &P) -> Result<Row> {
	match serde_json::to_value(params)? {
		Value::Object(row) => Ok(row),
		Value::Null => Ok(Row::new()),
		other => Err(Error::InvalidArgument(format!(
			"query parameters must be a map, not {}",
			mapper::value_kind(&other)
		))),
	}
}

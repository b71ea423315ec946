//! Entity <-> JSON record conversion.
//!
//! A [`Record`] is the backend-neutral form of an entity: the identifier
//! value split off from the remaining properties, whose keys are already
//! translated to column names. Backends turn records into their native
//! request types (documents, mutations, node properties).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::introspect::EntityShape;
use crate::naming::NamingPolicy;
use crate::registry::EntityMeta;

/// A result row or document body keyed by column name.
pub type Row = Map<String, Value>;

/// An entity split into identifier and translated fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
	/// Identifier value; `None` when absent or null
	pub id: Option<Value>,
	/// Remaining properties keyed by column name
	pub fields: Row,
}

impl Record {
	/// Split a result row, taking the identifier from the entity's id column.
	pub fn from_row(mut row: Row, meta: &EntityMeta) -> Self {
		let id = meta
			.id_column()
			.and_then(|column| row.remove(column))
			.filter(|value| !value.is_null());
		Self { id, fields: row }
	}

	/// Merge the identifier back under the entity's id column.
	pub fn into_row(self, meta: &EntityMeta) -> Row {
		let mut row = self.fields;
		if let (Some(column), Some(id)) = (meta.id_column(), self.id) {
			row.insert(column.to_string(), id);
		}
		row
	}

	/// Identifier value, or [`Error::MissingId`].
	pub fn require_id(&self, meta: &EntityMeta) -> Result<&Value> {
		self.id
			.as_ref()
			.ok_or_else(|| Error::missing_id(meta.type_name()))
	}
}

/// Convert an entity into a [`Record`].
///
/// Fails with [`Error::UnsupportedType`] when the entity does not serialize
/// to an object.
pub fn to_record<T: Entity>(entity: &T, meta: &EntityMeta) -> Result<Record> {
	let object = match serde_json::to_value(entity)? {
		Value::Object(object) => object,
		other => {
			return Err(Error::UnsupportedType(format!(
				"{} serialized to {} instead of an object",
				meta.type_name(),
				value_kind(&other)
			)));
		}
	};

	let mut record = Record::default();
	for (property, value) in object {
		if meta.id_property() == Some(property.as_str()) {
			if !value.is_null() {
				record.id = Some(value);
			}
			continue;
		}
		let column = meta.column_of(&property).into_owned();
		record.fields.insert(column, value);
	}
	Ok(record)
}

/// Convert a [`Record`] back into an entity.
pub fn from_record<T: Entity>(record: Record, meta: &EntityMeta) -> Result<T> {
	let mut object = Map::with_capacity(record.fields.len() + 1);
	for (column, value) in record.fields {
		let property = meta.property_of(&column).into_owned();
		object.insert(property, value);
	}
	if let (Some(property), Some(id)) = (meta.id_property(), record.id) {
		object.insert(property.to_string(), id);
	}

	serde_json::from_value(Value::Object(object)).map_err(|e| {
		Error::Conversion(format!("cannot convert record to {}: {}", meta.type_name(), e))
	})
}

/// Render an identifier value as text (document ids, row keys).
///
/// Strings are used verbatim, numbers and booleans in their JSON form.
pub fn id_to_text(id: &Value) -> Result<String> {
	match id {
		Value::String(s) => Ok(s.clone()),
		Value::Number(n) => Ok(n.to_string()),
		Value::Bool(b) => Ok(b.to_string()),
		other => Err(Error::InvalidArgument(format!(
			"{} cannot be used as an identifier",
			value_kind(other)
		))),
	}
}

/// Rebuild an entity whose identifier was stored as text.
///
/// The identifier is offered as a string first, then as the number or
/// boolean the text spells, so both `String` and integer id properties
/// round-trip through [`id_to_text`].
pub fn from_record_with_text_id<T: Entity>(id: &str, fields: Row, meta: &EntityMeta) -> Result<T> {
	let typed = match serde_json::from_str::<Value>(id) {
		Ok(value @ (Value::Number(_) | Value::Bool(_))) => Some(value),
		_ => None,
	};

	let Some(typed) = typed else {
		return from_record(
			Record {
				id: Some(Value::String(id.to_string())),
				fields,
			},
			meta,
		);
	};

	let as_text = Record {
		id: Some(Value::String(id.to_string())),
		fields: fields.clone(),
	};
	match from_record(as_text, meta) {
		Ok(entity) => Ok(entity),
		Err(first) => from_record(
			Record {
				id: Some(typed),
				fields,
			},
			meta,
		)
		.map_err(|_| first),
	}
}

/// Convert a JSON value into `T`, reporting mismatches as conversion errors.
pub fn convert_value<T: DeserializeOwned>(value: Value) -> Result<T> {
	let kind = value_kind(&value);
	serde_json::from_value(value).map_err(|e| {
		Error::Conversion(format!(
			"cannot convert {} to {}: {}",
			kind,
			std::any::type_name::<T>(),
			e
		))
	})
}

/// Extract a scalar from a result row.
///
/// A one-column row yields that column. A two-column row where one column
/// is the identifier yields the other column. Anything wider fails.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tessera_core::mapper::extract_scalar;
///
/// let row = json!({"id": "u1", "name": "Alice"}).as_object().unwrap().clone();
/// let name: String = extract_scalar(row, Some("id")).unwrap();
/// assert_eq!(name, "Alice");
/// ```
pub fn extract_scalar<T: DeserializeOwned>(mut row: Row, id_column: Option<&str>) -> Result<T> {
	match row.len() {
		0 => convert_value(Value::Null),
		1 => {
			let value = row.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
			convert_value(value)
		}
		2 if id_column.is_some_and(|column| row.contains_key(column)) => {
			if let Some(column) = id_column {
				row.remove(column);
			}
			let value = row.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
			convert_value(value)
		}
		n => Err(Error::Conversion(format!(
			"cannot extract {} from a row with {} columns: {:?}",
			std::any::type_name::<T>(),
			n,
			row.keys().collect::<Vec<_>>()
		))),
	}
}

/// Convert a result row into any deserializable target.
///
/// Struct targets get their columns translated back through `policy`, map
/// and flattened struct targets receive the row as-is and every other
/// target goes through [`extract_scalar`].
pub fn decode_row<T: DeserializeOwned>(
	row: Row,
	id_column: Option<&str>,
	policy: NamingPolicy,
) -> Result<T> {
	match EntityShape::of::<T>() {
		EntityShape::Struct { fields, .. } => {
			let mut object = Map::with_capacity(row.len());
			for (column, value) in row {
				let property = fields
					.iter()
					.find(|field| policy.translate(field) == column)
					.map(|field| field.to_string())
					.unwrap_or(column);
				object.insert(property, value);
			}
			convert_value(Value::Object(object))
		}
		EntityShape::Map | EntityShape::FlattenedStruct => convert_value(Value::Object(row)),
		EntityShape::Other => extract_scalar(row, id_column),
	}
}

/// Human readable JSON value kind for error messages.
pub fn value_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

//! Entity <-> row mapping.
//!
//! - the identifier property is the row key
//! - a nested struct property is a family (the declared family override,
//!   else the translated property name) whose qualifiers are the translated
//!   nested property names
//! - a map property is a family whose qualifiers are the map keys
//! - any other property is the cell `(family, translated name)` when the
//!   entity declares a default family (or the property a family override),
//!   else `(translated name, "")`
//!
//! Cells that match no property are skipped. A row whose properties are
//! all empty still gets one [`ROW_MARKER`] cell so that it exists, and
//! absent map, [`crate::Versions`] and nested struct properties read back
//! as empty values.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tessera_core::mapper::{self, Row};
use tessera_core::{Entity, EntityMeta, Error, Result};

use crate::codec::{self, CellCodec};
use crate::layout::{CellKind, EntityLayout, PropertyLayout};
use crate::model::{Cell, Put, RowResult};

/// Qualifier of the empty cell written for a row with no other cells
pub const ROW_MARKER: &str = "_row";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
	/// Top-level property stored in one cell
	Property { column: String, kind: CellKind },
	/// Property of a nested struct
	Nested {
		column: String,
		key: String,
		kind: CellKind,
	},
}

/// Resolved cell mapping of one entity type under one naming policy.
#[derive(Debug)]
pub struct ColumnMapping {
	meta: Arc<EntityMeta>,
	layout: EntityLayout,
	cells: HashMap<(String, String), Target>,
	/// Families holding a map property, by family name
	map_families: HashMap<String, String>,
}

impl ColumnMapping {
	pub fn new(meta: Arc<EntityMeta>, layout: EntityLayout) -> Self {
		let policy = meta.policy();
		let mut cells = HashMap::new();
		let mut map_families = HashMap::new();

		for property in meta.properties() {
			let family = property.family.as_deref();
			match layout.property(&property.name) {
				Some(PropertyLayout::Struct(nested)) => {
					let family = family.unwrap_or(&property.column);
					for (key, kind) in nested {
						cells.insert(
							(family.to_string(), policy.translate(key)),
							Target::Nested {
								column: property.column.clone(),
								key: key.to_string(),
								kind: *kind,
							},
						);
					}
				}
				Some(PropertyLayout::Map) => {
					map_families.insert(
						family.unwrap_or(&property.column).to_string(),
						property.column.clone(),
					);
				}
				Some(PropertyLayout::Cell(kind)) => {
					cells.insert(
						scalar_cell(family.or(meta.default_family()), &property.column),
						Target::Property {
							column: property.column.clone(),
							kind: *kind,
						},
					);
				}
				None => {
					cells.insert(
						scalar_cell(family.or(meta.default_family()), &property.column),
						Target::Property {
							column: property.column.clone(),
							kind: CellKind::Plain,
						},
					);
				}
			}
		}

		Self {
			meta,
			layout,
			cells,
			map_families,
		}
	}

	pub fn meta(&self) -> &Arc<EntityMeta> {
		&self.meta
	}

	pub fn layout(&self) -> &EntityLayout {
		&self.layout
	}

	/// Native put for `entity`.
	pub fn to_put<T: Entity>(&self, entity: &T) -> Result<Put> {
		let meta = &self.meta;
		meta.require_id()?;
		let record = mapper::to_record(entity, meta)?;
		let key = codec::id_key(record.require_id(meta)?)?;
		if key.is_empty() {
			return Err(Error::missing_id(meta.type_name()));
		}

		let mut put = Put::new(key);
		for (column, value) in record.fields {
			if value.is_null() {
				continue;
			}
			let property = meta.property_by_column(&column);
			let family = property.and_then(|p| p.family.as_deref());
			let layout = match property {
				Some(p) => self.layout.property(&p.name),
				None => None,
			};

			match (layout, value) {
				(Some(PropertyLayout::Struct(nested)), Value::Object(object)) => {
					let family = family.unwrap_or(&column);
					for (key, value) in object {
						if value.is_null() {
							continue;
						}
						let kind = nested
							.iter()
							.find(|(name, _)| *name == key)
							.map_or(CellKind::Plain, |(_, kind)| *kind);
						let qualifier = meta.policy().translate(&key);
						put = add_cells(put, family, &qualifier, kind, value)?;
					}
				}
				(Some(PropertyLayout::Map), Value::Object(object)) => {
					let family = family.unwrap_or(&column);
					for (key, value) in object {
						put = add_cells(put, family, &key, CellKind::Plain, value)?;
					}
				}
				(None, Value::Object(object)) if meta.is_map() => {
					for (key, value) in object {
						put = add_cells(put, &column, &key, CellKind::Plain, value)?;
					}
				}
				(layout, value) => {
					let kind = match layout {
						Some(PropertyLayout::Cell(kind)) => *kind,
						_ => CellKind::Plain,
					};
					let (family, qualifier) =
						scalar_cell(family.or(meta.default_family()), &column);
					put = add_cells(put, &family, &qualifier, kind, value)?;
				}
			}
		}

		if put.columns.is_empty() {
			let Some(family) = self.home_family() else {
				return Err(Error::InvalidArgument(format!(
					"{} has no column family to hold a row without values",
					meta.type_name()
				)));
			};
			put = put.add_column(family.as_bytes().to_vec(), ROW_MARKER.as_bytes(), Vec::new());
		}
		Ok(put)
	}

	/// Family of the row marker: the default family, else the family of the
	/// first property.
	fn home_family(&self) -> Option<&str> {
		self.meta.default_family().or_else(|| {
			self.meta
				.properties()
				.first()
				.map(|property| property.family.as_deref().unwrap_or(&property.column))
		})
	}

	fn is_marker(&self, family: &str, qualifier: &str) -> bool {
		qualifier == ROW_MARKER && self.home_family() == Some(family)
	}

	/// Entity from a row; `None` for an empty result.
	pub fn to_entity<T: Entity>(&self, result: &RowResult) -> Result<Option<T>> {
		if result.is_empty() {
			return Ok(None);
		}
		let key = codec::key_text(result.row())?;
		let fields = if self.meta.is_map() {
			self.map_fields(result)
		} else {
			let mut fields = self.struct_fields(result);
			self.fill_absent(&mut fields);
			fields
		};
		mapper::from_record_with_text_id(&key, fields, &self.meta).map(Some)
	}

	fn struct_fields(&self, result: &RowResult) -> Row {
		let mut fields = Row::new();
		for cells in result.columns() {
			let Some((family, qualifier)) = column_names(cells) else {
				continue;
			};

			if self.is_marker(family, qualifier) {
				continue;
			}
			if let Some(target) = self.cells.get(&(family.to_string(), qualifier.to_string())) {
				match target {
					Target::Property { column, kind } => {
						fields.insert(column.clone(), cell_value(cells, *kind));
					}
					Target::Nested { column, key, kind } => {
						nested_object(&mut fields, column).insert(key.clone(), cell_value(cells, *kind));
					}
				}
			} else if let Some(column) = self.map_families.get(family) {
				nested_object(&mut fields, column)
					.insert(qualifier.to_string(), cell_value(cells, CellKind::Plain));
			} else {
				tracing::debug!(
					entity = self.meta.type_name(),
					family,
					qualifier,
					"skipping unmapped column"
				);
			}
		}
		fields
	}

	/// Empty values for collection properties that wrote no cells.
	fn fill_absent(&self, fields: &mut Row) {
		for property in self.meta.properties() {
			if self.layout.is_optional(&property.name) {
				continue;
			}
			match self.layout.property(&property.name) {
				Some(PropertyLayout::Map) => {
					nested_object(fields, &property.column);
				}
				Some(PropertyLayout::Cell(CellKind::AllVersions)) => {
					fields
						.entry(property.column.clone())
						.or_insert_with(empty_versions);
				}
				Some(PropertyLayout::Struct(nested)) => {
					let object = nested_object(fields, &property.column);
					for (key, kind) in nested {
						if *kind == CellKind::AllVersions {
							object.entry(key.to_string()).or_insert_with(empty_versions);
						}
					}
				}
				_ => {}
			}
		}
	}

	fn map_fields(&self, result: &RowResult) -> Row {
		let mut fields = Row::new();
		for cells in result.columns() {
			let Some((family, qualifier)) = column_names(cells) else {
				continue;
			};
			if self.is_marker(family, qualifier) {
				continue;
			}
			let value = cell_value(cells, CellKind::Plain);
			if qualifier.is_empty() {
				fields.insert(family.to_string(), value);
			} else if self.meta.default_family() == Some(family) {
				fields.insert(qualifier.to_string(), value);
			} else {
				nested_object(&mut fields, family).insert(qualifier.to_string(), value);
			}
		}
		fields
	}
}

/// `(family, qualifier)` of a scalar property.
fn scalar_cell(family: Option<&str>, column: &str) -> (String, String) {
	match family {
		Some(family) => (family.to_string(), column.to_string()),
		None => (column.to_string(), String::new()),
	}
}

fn add_cells(mut put: Put, family: &str, qualifier: &str, kind: CellKind, value: Value) -> Result<Put> {
	let family = family.as_bytes().to_vec();
	let qualifier = qualifier.as_bytes().to_vec();
	match kind {
		CellKind::Plain => Ok(put.add_column(family, qualifier, CellCodec::encode_value(&value))),
		CellKind::Latest => {
			let (value, version) = versioned(value)?;
			Ok(add_version(put, family, qualifier, &value, version))
		}
		CellKind::AllVersions => {
			let Value::Object(mut object) = value else {
				return Err(Error::Conversion("versions must serialize to an object".to_string()));
			};
			let Some(Value::Array(versions)) = object.remove("values") else {
				return Err(Error::Conversion("versions must carry a `values` list".to_string()));
			};
			for entry in versions {
				let (value, version) = versioned(entry)?;
				put = add_version(put, family.clone(), qualifier.clone(), &value, version);
			}
			Ok(put)
		}
	}
}

fn add_version(put: Put, family: Vec<u8>, qualifier: Vec<u8>, value: &Value, version: u64) -> Put {
	let value = CellCodec::encode_value(value);
	if version == 0 {
		put.add_column(family, qualifier, value)
	} else {
		put.add_column_at(family, qualifier, version, value)
	}
}

fn versioned(value: Value) -> Result<(Value, u64)> {
	let Value::Object(mut object) = value else {
		return Err(Error::Conversion(
			"versioned columns must serialize to an object".to_string(),
		));
	};
	let version = object.get("version").and_then(Value::as_u64).unwrap_or(0);
	let value = object.remove("value").unwrap_or(Value::Null);
	Ok((value, version))
}

fn cell_value(cells: &[Cell], kind: CellKind) -> Value {
	let version = |cell: &Cell| {
		json!({
			"value": CellCodec::decode_value(&cell.value),
			"version": cell.timestamp,
		})
	};
	match kind {
		CellKind::Plain => cells
			.first()
			.map_or(Value::Null, |cell| CellCodec::decode_value(&cell.value)),
		CellKind::Latest => cells.first().map_or(Value::Null, version),
		CellKind::AllVersions => json!({ "values": cells.iter().map(version).collect::<Vec<_>>() }),
	}
}

fn empty_versions() -> Value {
	json!({ "values": [] })
}

fn column_names(cells: &[Cell]) -> Option<(&str, &str)> {
	let cell = cells.first()?;
	let family = std::str::from_utf8(&cell.family).ok()?;
	let qualifier = std::str::from_utf8(&cell.qualifier).ok()?;
	Some((family, qualifier))
}

fn nested_object<'a>(fields: &'a mut Row, column: &str) -> &'a mut Map<String, Value> {
	let slot = fields
		.entry(column.to_string())
		.or_insert_with(|| Value::Object(Map::new()));
	if !slot.is_object() {
		*slot = Value::Object(Map::new());
	}
	match slot {
		Value::Object(object) => object,
		_ => unreachable!("slot was just made an object"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::column::{HBaseColumn, Versions};
	use bytes::Bytes;
	use rstest::rstest;
	use serde::{Deserialize, Serialize};
	use tessera_core::{EntityRegistry, NamingPolicy};

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Name {
		first_name: String,
		last_name: String,
	}

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Contact {
		id: String,
		full_name: Name,
		email_address: String,
		balance: HBaseColumn<i64>,
	}

	impl Entity for Contact {}

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Profile {
		id: u64,
		nick_name: String,
		home_town: Option<String>,
		status: Versions<String>,
	}

	impl Entity for Profile {
		const COLUMN_FAMILY: Option<&'static str> = Some("info");
		const FAMILIES: &'static [(&'static str, &'static str)] = &[("status", "audit")];
	}

	fn mapping<T: Entity>(policy: NamingPolicy) -> ColumnMapping {
		let registry = EntityRegistry::new();
		ColumnMapping::new(registry.meta::<T>(policy).unwrap(), EntityLayout::of::<T>())
	}

	fn to_result(put: &Put) -> RowResult {
		let cells = put
			.columns
			.iter()
			.map(|column| Cell {
				row: put.row.clone(),
				family: column.family.clone(),
				qualifier: column.qualifier.clone(),
				timestamp: column.timestamp.unwrap_or(100),
				value: column.value.clone(),
			})
			.collect();
		RowResult::new(put.row.clone(), cells)
	}

	fn columns(put: &Put) -> Vec<(String, String)> {
		put.columns
			.iter()
			.map(|c| {
				(
					String::from_utf8(c.family.to_vec()).unwrap(),
					String::from_utf8(c.qualifier.to_vec()).unwrap(),
				)
			})
			.collect()
	}

	#[rstest]
	fn test_nested_struct_becomes_family() {
		let mapping = mapping::<Contact>(NamingPolicy::LowerCamelCase);
		let contact = Contact {
			id: "c1".to_string(),
			full_name: Name {
				first_name: "Ada".to_string(),
				last_name: "Lovelace".to_string(),
			},
			email_address: "ada@example.com".to_string(),
			balance: HBaseColumn::at(10, 7),
		};

		let put = mapping.to_put(&contact).unwrap();
		assert_eq!(put.row.as_ref(), b"c1");
		let mut cells = columns(&put);
		cells.sort();
		assert_eq!(
			cells,
			vec![
				("balance".to_string(), String::new()),
				("emailAddress".to_string(), String::new()),
				("fullName".to_string(), "firstName".to_string()),
				("fullName".to_string(), "lastName".to_string()),
			]
		);
		let balance = put
			.columns
			.iter()
			.find(|c| c.family.as_ref() == b"balance")
			.unwrap();
		assert_eq!(balance.timestamp, Some(7));

		let back: Contact = mapping.to_entity(&to_result(&put)).unwrap().unwrap();
		assert_eq!(back, contact);
	}

	#[rstest]
	fn test_default_family_and_override() {
		let mapping = mapping::<Profile>(NamingPolicy::SnakeCase);
		let profile = Profile {
			id: 42,
			nick_name: "ada".to_string(),
			home_town: None,
			status: [HBaseColumn::at("active".to_string(), 20), HBaseColumn::at("new".to_string(), 10)]
				.into_iter()
				.collect(),
		};

		let put = mapping.to_put(&profile).unwrap();
		assert_eq!(put.row.as_ref(), b"42");
		let mut cells = columns(&put);
		cells.sort();
		assert_eq!(
			cells,
			vec![
				("audit".to_string(), "status".to_string()),
				("audit".to_string(), "status".to_string()),
				("info".to_string(), "nick_name".to_string()),
			]
		);

		let back: Profile = mapping.to_entity(&to_result(&put)).unwrap().unwrap();
		assert_eq!(back, profile);
		assert_eq!(back.status.latest().unwrap().value, "active");
	}

	#[rstest]
	fn test_unknown_columns_are_skipped() {
		let mapping = mapping::<Profile>(NamingPolicy::SnakeCase);
		let cell = |family: &'static str, qualifier: &'static str, value: &'static str| Cell {
			row: Bytes::from_static(b"7"),
			family: Bytes::from_static(family.as_bytes()),
			qualifier: Bytes::from_static(qualifier.as_bytes()),
			timestamp: 1,
			value: Bytes::from_static(value.as_bytes()),
		};
		let result = RowResult::new(
			"7",
			vec![
				cell("info", "nick_name", "ada"),
				cell("info", "legacy_flag", "true"),
				cell("metrics", "", "3"),
			],
		);
		let profile: Profile = mapping.to_entity(&result).unwrap().unwrap();
		assert_eq!(profile.id, 7);
		assert_eq!(profile.nick_name, "ada");
		assert!(profile.status.is_empty());
	}

	#[rstest]
	fn test_missing_id_and_empty_rows() {
		let mapping = mapping::<Contact>(NamingPolicy::Preserve);
		let contact = Contact {
			id: String::new(),
			full_name: Name {
				first_name: "A".to_string(),
				last_name: "B".to_string(),
			},
			email_address: "x".to_string(),
			balance: HBaseColumn::new(0),
		};
		assert!(matches!(mapping.to_put(&contact), Err(Error::MissingId { .. })));
		assert!(mapping
			.to_entity::<Contact>(&RowResult::empty("c1"))
			.unwrap()
			.is_none());
	}

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Address {
		street: Option<String>,
		history: Versions<String>,
	}

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Tagged {
		id: String,
		name: Option<String>,
		tags: HashMap<String, String>,
		status: Versions<String>,
		address: Address,
		aliases: Option<HashMap<String, String>>,
	}

	impl Entity for Tagged {}

	#[rstest]
	#[case(Some("Ada"), vec![("name", "")])]
	#[case(None, vec![("name", ROW_MARKER)])]
	fn test_empty_collections_round_trip(
		#[case] name: Option<&str>,
		#[case] expected: Vec<(&str, &str)>,
	) {
		let mapping = mapping::<Tagged>(NamingPolicy::SnakeCase);
		let tagged = Tagged {
			id: "t1".to_string(),
			name: name.map(str::to_string),
			tags: HashMap::new(),
			status: Versions::default(),
			address: Address {
				street: None,
				history: Versions::default(),
			},
			aliases: None,
		};

		let put = mapping.to_put(&tagged).unwrap();
		let expected: Vec<(String, String)> = expected
			.into_iter()
			.map(|(family, qualifier)| (family.to_string(), qualifier.to_string()))
			.collect();
		assert_eq!(columns(&put), expected);

		let back: Option<Tagged> = mapping.to_entity(&to_result(&put)).unwrap();
		assert_eq!(back, Some(tagged));
	}

	#[rstest]
	fn test_marker_needs_a_family() {
		let mapping = mapping::<serde_json::Map<String, Value>>(NamingPolicy::Preserve);
		let mut map = serde_json::Map::new();
		map.insert("id".to_string(), json!("only-id"));
		assert!(matches!(mapping.to_put(&map), Err(Error::InvalidArgument(_))));
	}

	#[rstest]
	fn test_map_entities() {
		let mapping = mapping::<serde_json::Map<String, Value>>(NamingPolicy::SnakeCase);
		let mut map = serde_json::Map::new();
		map.insert("id".to_string(), json!("row-1"));
		map.insert("title".to_string(), json!("Dune"));
		map.insert("stats".to_string(), json!({"views": 3}));

		let put = mapping.to_put(&map).unwrap();
		let mut cells = columns(&put);
		cells.sort();
		assert_eq!(
			cells,
			vec![
				("stats".to_string(), "views".to_string()),
				("title".to_string(), String::new()),
			]
		);
		let back: serde_json::Map<String, Value> =
			mapping.to_entity(&to_result(&put)).unwrap().unwrap();
		assert_eq!(back, map);
	}
}

//! Column layout of an entity type.
//!
//! Mapping needs to know, per property, whether the property is a nested
//! struct (a column family of its own), a map, a versioned cell or a plain
//! value. A walking deserializer follows one field path per pass: it answers
//! the struct visitor with a single key and records how the value type asks
//! to be deserialized.

use std::fmt;

use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, Visitor};
use serde::forward_to_deserialize_any;
use tessera_core::EntityShape;

use crate::column::{COLUMN_MARKER, VERSIONS_MARKER};

/// How a value is stored in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
	/// Newest version only
	Plain,
	/// Newest version with its timestamp ([`crate::HBaseColumn`])
	Latest,
	/// Every version ([`crate::Versions`])
	AllVersions,
}

/// How a top-level property is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyLayout {
	/// One cell
	Cell(CellKind),
	/// A family whose qualifiers are the nested struct's properties
	Struct(Vec<(&'static str, CellKind)>),
	/// A family whose qualifiers are the map keys
	Map,
}

/// Layout of every property of an entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityLayout {
	properties: Vec<(&'static str, PropertyLayout)>,
	/// Properties declared as `Option<_>`
	optional: Vec<&'static str>,
}

impl EntityLayout {
	/// Inspect `T`. Non-struct types get an empty layout.
	pub fn of<T: DeserializeOwned>() -> Self {
		let EntityShape::Struct { fields, .. } = EntityShape::of::<T>() else {
			return Self::default();
		};

		let mut optional = Vec::new();
		let properties = fields
			.iter()
			.map(|&field| {
				let (found, is_optional) = walk::<T>(&[field]);
				if is_optional {
					optional.push(field);
				}
				let layout = match found {
					Found::Struct { name, .. } if name == COLUMN_MARKER => {
						PropertyLayout::Cell(CellKind::Latest)
					}
					Found::Struct { name, .. } if name == VERSIONS_MARKER => {
						PropertyLayout::Cell(CellKind::AllVersions)
					}
					Found::Struct { fields: nested, .. } => PropertyLayout::Struct(
						nested
							.iter()
							.map(|&inner| (inner, cell_kind(walk::<T>(&[field, inner]).0)))
							.collect(),
					),
					Found::Map => PropertyLayout::Map,
					Found::Plain => PropertyLayout::Cell(CellKind::Plain),
				};
				(field, layout)
			})
			.collect();

		Self {
			properties,
			optional,
		}
	}

	pub fn property(&self, name: &str) -> Option<&PropertyLayout> {
		self.properties
			.iter()
			.find(|(property, _)| *property == name)
			.map(|(_, layout)| layout)
	}

	pub fn properties(&self) -> &[(&'static str, PropertyLayout)] {
		&self.properties
	}

	/// Whether the property is an `Option`, so an absent value reads as `None`.
	pub fn is_optional(&self, name: &str) -> bool {
		self.optional.contains(&name)
	}

	/// Whether any cell keeps more than its newest version.
	pub fn reads_all_versions(&self) -> bool {
		self.properties.iter().any(|(_, layout)| match layout {
			PropertyLayout::Cell(kind) => *kind == CellKind::AllVersions,
			PropertyLayout::Struct(nested) => {
				nested.iter().any(|(_, kind)| *kind == CellKind::AllVersions)
			}
			PropertyLayout::Map => false,
		})
	}
}

fn cell_kind(found: Found) -> CellKind {
	match found {
		Found::Struct { name, .. } if name == COLUMN_MARKER => CellKind::Latest,
		Found::Struct { name, .. } if name == VERSIONS_MARKER => CellKind::AllVersions,
		_ => CellKind::Plain,
	}
}

#[derive(Debug, Clone, Copy)]
enum Found {
	Plain,
	Map,
	Struct {
		name: &'static str,
		fields: &'static [&'static str],
	},
}

fn walk<T: DeserializeOwned>(path: &[&'static str]) -> (Found, bool) {
	let mut walker = FieldWalker {
		path,
		found: None,
		optional: false,
	};
	// The walk always fails; only the recorded finding matters.
	let _ = T::deserialize(&mut walker);
	(walker.found.unwrap_or(Found::Plain), walker.optional)
}

struct FieldWalker<'p> {
	/// Remaining field names to descend through
	path: &'p [&'static str],
	found: Option<Found>,
	/// Whether the field at the end of the path is an `Option`
	optional: bool,
}

#[derive(Debug)]
struct Walked;

impl fmt::Display for Walked {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("layout walked")
	}
}

impl std::error::Error for Walked {}

impl de::Error for Walked {
	fn custom<T: fmt::Display>(_msg: T) -> Self {
		Walked
	}
}

impl<'de, 'a, 'p> de::Deserializer<'de> for &'a mut FieldWalker<'p> {
	type Error = Walked;

	fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
		self.found = Some(Found::Plain);
		Err(Walked)
	}

	fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
		if self.path.is_empty() {
			self.optional = true;
		}
		visitor.visit_some(self)
	}

	fn deserialize_newtype_struct<V: Visitor<'de>>(
		self,
		_name: &'static str,
		visitor: V,
	) -> Result<V::Value, Self::Error> {
		visitor.visit_newtype_struct(self)
	}

	fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
		self.found = Some(if self.path.is_empty() {
			Found::Map
		} else {
			Found::Plain
		});
		Err(Walked)
	}

	fn deserialize_struct<V: Visitor<'de>>(
		self,
		name: &'static str,
		fields: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value, Self::Error> {
		let path = self.path;
		match path.split_first() {
			None => {
				self.found = Some(Found::Struct { name, fields });
				Err(Walked)
			}
			Some((&field, rest)) => {
				self.path = rest;
				visitor.visit_map(PathAccess {
					key: Some(field),
					walker: self,
				})
			}
		}
	}

	forward_to_deserialize_any! {
		bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
		bytes byte_buf unit unit_struct seq tuple
		tuple_struct enum identifier ignored_any
	}
}

struct PathAccess<'a, 'p> {
	key: Option<&'static str>,
	walker: &'a mut FieldWalker<'p>,
}

impl<'de, 'a, 'p> MapAccess<'de> for PathAccess<'a, 'p> {
	type Error = Walked;

	fn next_key_seed<K: DeserializeSeed<'de>>(
		&mut self,
		seed: K,
	) -> Result<Option<K::Value>, Self::Error> {
		match self.key.take() {
			Some(key) => seed
				.deserialize(de::value::BorrowedStrDeserializer::<Walked>::new(key))
				.map(Some),
			None => Err(Walked),
		}
	}

	fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
		seed.deserialize(&mut *self.walker)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::column::{HBaseColumn, Versions};
	use rstest::rstest;
	use serde::Deserialize;
	use std::collections::HashMap;

	#[derive(Deserialize)]
	#[allow(dead_code)]
	struct Name {
		first_name: String,
		last_name: HBaseColumn<String>,
	}

	#[derive(Deserialize)]
	#[allow(dead_code)]
	struct Contact {
		id: String,
		name: Name,
		balance: HBaseColumn<i64>,
		history: Versions<String>,
		previous: Option<Name>,
		tags: Vec<String>,
		attributes: HashMap<String, String>,
		age: Option<u32>,
	}

	#[rstest]
	fn test_layout_of_mixed_entity() {
		let layout = EntityLayout::of::<Contact>();
		assert_eq!(layout.property("id"), Some(&PropertyLayout::Cell(CellKind::Plain)));
		assert_eq!(
			layout.property("name"),
			Some(&PropertyLayout::Struct(vec![
				("first_name", CellKind::Plain),
				("last_name", CellKind::Latest),
			]))
		);
		assert_eq!(layout.property("previous"), layout.property("name"));
		assert_eq!(
			layout.property("balance"),
			Some(&PropertyLayout::Cell(CellKind::Latest))
		);
		assert_eq!(
			layout.property("history"),
			Some(&PropertyLayout::Cell(CellKind::AllVersions))
		);
		assert_eq!(layout.property("tags"), Some(&PropertyLayout::Cell(CellKind::Plain)));
		assert_eq!(layout.property("attributes"), Some(&PropertyLayout::Map));
		assert_eq!(layout.property("age"), Some(&PropertyLayout::Cell(CellKind::Plain)));
		assert!(layout.reads_all_versions());
		assert!(layout.is_optional("previous"));
		assert!(layout.is_optional("age"));
		assert!(!layout.is_optional("name"));
		assert!(!layout.is_optional("attributes"));
	}

	#[rstest]
	fn test_layout_of_map_is_empty() {
		let layout = EntityLayout::of::<HashMap<String, serde_json::Value>>();
		assert!(layout.properties().is_empty());
		assert!(!layout.reads_all_versions());
	}
}

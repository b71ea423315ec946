//! Shape discovery for entity types.
//!
//! Serde derives hand the full list of serialized field names to
//! `Deserializer::deserialize_struct`. A recording deserializer that stops
//! right there tells us, without an instance, whether a type is a struct
//! (and which properties it has) or a string-keyed map.
//!
//! A struct with a `#[serde(flatten)]` field asks for a map instead and
//! never lists its fields. It is told apart from a real map by its
//! visitor, which expects `struct Name`, and reported as
//! [`EntityShape::FlattenedStruct`].

use std::fmt;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::forward_to_deserialize_any;

/// Structural kind of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityShape {
	/// A struct with named fields, in declaration order
	Struct {
		name: &'static str,
		fields: &'static [&'static str],
	},
	/// A key-value map
	Map,
	/// A struct using `#[serde(flatten)]`, whose fields cannot be listed
	FlattenedStruct,
	/// Anything else (scalars, sequences, enums, tuples)
	Other,
}

impl EntityShape {
	/// Discover the shape of `T`.
	///
	/// # Examples
	///
	/// ```
	/// use serde::Deserialize;
	/// use std::collections::HashMap;
	/// use tessera_core::EntityShape;
	///
	/// #[derive(Deserialize)]
	/// struct Account {
	///     id: String,
	///     balance: i64,
	/// }
	///
	/// assert_eq!(
	///     EntityShape::of::<Account>(),
	///     EntityShape::Struct { name: "Account", fields: &["id", "balance"] }
	/// );
	/// assert_eq!(EntityShape::of::<HashMap<String, i64>>(), EntityShape::Map);
	/// assert_eq!(EntityShape::of::<i64>(), EntityShape::Other);
	/// ```
	pub fn of<T: DeserializeOwned>() -> EntityShape {
		let mut recorder = ShapeRecorder { shape: None };
		// Deserialization always fails; only the recorded shape matters.
		let _ = T::deserialize(&mut recorder);
		recorder.shape.unwrap_or(EntityShape::Other)
	}
}

struct ShapeRecorder {
	shape: Option<EntityShape>,
}

#[derive(Debug)]
struct Recorded;

impl fmt::Display for Recorded {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("shape recorded")
	}
}

impl std::error::Error for Recorded {}

impl de::Error for Recorded {
	fn custom<T: fmt::Display>(_msg: T) -> Self {
		Recorded
	}
}

impl<'de> de::Deserializer<'de> for &mut ShapeRecorder {
	type Error = Recorded;

	fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
		self.shape = Some(EntityShape::Other);
		Err(Recorded)
	}

	fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
		let expecting = (&visitor as &dyn de::Expected).to_string();
		self.shape = Some(if expecting.starts_with("struct ") {
			EntityShape::FlattenedStruct
		} else {
			EntityShape::Map
		});
		Err(Recorded)
	}

	fn deserialize_struct<V: Visitor<'de>>(
		self,
		name: &'static str,
		fields: &'static [&'static str],
		_visitor: V,
	) -> Result<V::Value, Self::Error> {
		self.shape = Some(EntityShape::Struct { name, fields });
		Err(Recorded)
	}

	forward_to_deserialize_any! {
		bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
		bytes byte_buf option unit unit_struct newtype_struct seq tuple
		tuple_struct enum identifier ignored_any
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde::Deserialize;
	use std::collections::BTreeMap;

	#[derive(Deserialize)]
	#[allow(dead_code)]
	struct Renamed {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(default)]
		tags: Vec<String>,
	}

	#[derive(Deserialize)]
	#[allow(dead_code)]
	struct WithExtras {
		id: String,
		#[serde(flatten)]
		extras: BTreeMap<String, serde_json::Value>,
	}

	#[derive(Deserialize)]
	#[allow(dead_code)]
	enum Status {
		Active,
		Disabled,
	}

	#[rstest]
	fn test_struct_shape_uses_serialized_names() {
		assert_eq!(
			EntityShape::of::<Renamed>(),
			EntityShape::Struct {
				name: "Renamed",
				fields: &["userId", "tags"],
			}
		);
	}

	#[rstest]
	fn test_map_and_other_shapes() {
		assert_eq!(
			EntityShape::of::<BTreeMap<String, serde_json::Value>>(),
			EntityShape::Map
		);
		assert_eq!(EntityShape::of::<Vec<String>>(), EntityShape::Other);
		assert_eq!(EntityShape::of::<Status>(), EntityShape::Other);
		assert_eq!(EntityShape::of::<String>(), EntityShape::Other);
	}

	#[rstest]
	fn test_flattened_struct_is_not_a_map() {
		assert_eq!(EntityShape::of::<WithExtras>(), EntityShape::FlattenedStruct);
		assert_eq!(
			EntityShape::of::<std::collections::HashMap<String, i64>>(),
			EntityShape::Map
		);
	}
}

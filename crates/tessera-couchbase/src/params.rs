//! Query parameters
//!
//! [`QueryParams`] is what callers pass alongside a statement; after the
//! statement has been parsed the parameters are checked and turned into
//! [`BoundParams`], the shape sent to the query service.

use serde::Serialize;
use serde_json::{Map, Value};
use tessera_core::{Entity, EntityMeta, Error, Result, mapper};

/// Parameters supplied with a N1QL statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueryParams {
	/// No parameters
	#[default]
	None,
	/// Values for `$1`-style or `?` placeholders, in order
	Positional(Vec<Value>),
	/// Values for `$name` placeholders, keyed without the `$`
	Named(Map<String, Value>),
}

impl QueryParams {
	/// Positional parameters from serializable values.
	///
	/// # Examples
	///
	/// ```
	/// use serde_json::json;
	/// use tessera_couchbase::QueryParams;
	///
	/// let params = QueryParams::positional(["alice", "bob"]).unwrap();
	/// assert_eq!(params, QueryParams::Positional(vec![json!("alice"), json!("bob")]));
	/// ```
	pub fn positional<I, V>(values: I) -> Result<Self>
	where
		I: IntoIterator<Item = V>,
		V: Serialize,
	{
		let values = values
			.into_iter()
			.map(|value| serde_json::to_value(value).map_err(Error::from))
			.collect::<Result<Vec<_>>>()?;
		Ok(Self::Positional(values))
	}

	/// A single positional parameter.
	pub fn single<V: Serialize>(value: V) -> Result<Self> {
		Ok(Self::Positional(vec![serde_json::to_value(value)?]))
	}

	/// Named parameters from `(name, value)` pairs.
	///
	/// A leading `$` on a name is accepted and dropped.
	pub fn named<I, K, V>(pairs: I) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Serialize,
	{
		let mut map = Map::new();
		for (name, value) in pairs {
			let name = name.as_ref();
			map.insert(
				name.strip_prefix('$').unwrap_or(name).to_string(),
				serde_json::to_value(value)?,
			);
		}
		Ok(Self::Named(map))
	}

	/// Named parameters taken from the properties of an entity.
	///
	/// Parameter names are the column names of `meta`; the identifier is
	/// available under its column name as well.
	pub fn from_entity<T: Entity>(entity: &T, meta: &EntityMeta) -> Result<Self> {
		let record = mapper::to_record(entity, meta)?;
		Ok(Self::Named(record.into_row(meta)))
	}

	pub fn is_empty(&self) -> bool {
		match self {
			Self::None => true,
			Self::Positional(values) => values.is_empty(),
			Self::Named(map) => map.is_empty(),
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::None => 0,
			Self::Positional(values) => values.len(),
			Self::Named(map) => map.len(),
		}
	}
}

impl From<Vec<Value>> for QueryParams {
	fn from(values: Vec<Value>) -> Self {
		Self::Positional(values)
	}
}

impl From<Map<String, Value>> for QueryParams {
	fn from(map: Map<String, Value>) -> Self {
		Self::Named(map)
	}
}

impl From<()> for QueryParams {
	fn from(_: ()) -> Self {
		Self::None
	}
}

/// Parameters checked against a parsed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BoundParams {
	#[default]
	None,
	/// Sent as the `args` array
	Positional(Vec<Value>),
	/// Sent as `$name` request fields
	Named(Map<String, Value>),
}

impl BoundParams {
	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}
}

//! The `Entity` trait implemented by types the executors map.

use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, de::DeserializeOwned};

/// Convention-based identifier property name.
pub const DEFAULT_ID_PROPERTY: &str = "id";

/// A user type the executors convert to and from native records.
///
/// Every item has a default, so `impl Entity for User {}` is enough for a
/// struct with an `id` field. Property names are the serialized (serde)
/// names. Structs with a `#[serde(flatten)]` field cannot list their
/// properties and are rejected with [`crate::Error::UnsupportedType`]; use a
/// map entity for open-ended documents.
///
/// ## Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tessera_core::Entity;
///
/// #[derive(Serialize, Deserialize)]
/// struct Account {
///     account_no: String,
///     owner: String,
/// }
///
/// impl Entity for Account {
///     const ID_PROPERTY: Option<&'static str> = Some("account_no");
///     const NAME: Option<&'static str> = Some("accounts");
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
	/// Explicitly declared identifier property.
	///
	/// When `None`, a property literally named `id` is used.
	const ID_PROPERTY: Option<&'static str> = None;

	/// Collection, table or label name override.
	///
	/// Defaults to the struct name.
	const NAME: Option<&'static str> = None;

	/// Default column family for scalar properties (column-family stores).
	const COLUMN_FAMILY: Option<&'static str> = None;

	/// Per-property column family overrides as `(property, family)` pairs.
	const FAMILIES: &'static [(&'static str, &'static str)] = &[];
}

impl<S> Entity for HashMap<String, serde_json::Value, S>
where
	S: std::hash::BuildHasher + Default + Send + Sync + 'static,
{
}

impl Entity for BTreeMap<String, serde_json::Value> {}

impl Entity for serde_json::Map<String, serde_json::Value> {}

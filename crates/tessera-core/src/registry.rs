//! Per-type entity metadata and its memoizing registry.
//!
//! [`EntityMeta`] is resolved once per `(entity type, naming policy)` pair and
//! shared through an `Arc`. Executors hold an [`EntityRegistry`]; several
//! executors may share one.

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::entity::{DEFAULT_ID_PROPERTY, Entity};
use crate::error::{Error, Result};
use crate::introspect::EntityShape;
use crate::naming::NamingPolicy;

/// Whether an entity is a struct or a generic map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
	Struct,
	Map,
}

/// One non-identifier property of a struct entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
	/// Serialized property name
	pub name: String,
	/// Translated column / key name
	pub column: String,
	/// Column family override declared on the entity
	pub family: Option<String>,
}

/// Resolved mapping metadata for one entity type under one naming policy.
#[derive(Debug)]
pub struct EntityMeta {
	name: String,
	type_name: &'static str,
	kind: EntityKind,
	policy: NamingPolicy,
	id_property: Option<String>,
	id_column: Option<String>,
	default_family: Option<String>,
	properties: Vec<PropertyMeta>,
	by_property: HashMap<String, usize>,
	by_column: HashMap<String, usize>,
}

impl EntityMeta {
	/// Resolve the metadata of `T` under `policy`.
	pub fn resolve<T: Entity>(policy: NamingPolicy) -> Result<Self> {
		let type_name = std::any::type_name::<T>();

		match EntityShape::of::<T>() {
			EntityShape::Struct { name, fields } => {
				let id_property = match T::ID_PROPERTY {
					Some(declared) if fields.contains(&declared) => Some(declared.to_string()),
					Some(declared) => {
						return Err(Error::InvalidArgument(format!(
							"declared id property `{}` is not a property of {}",
							declared, type_name
						)));
					}
					None if fields.contains(&DEFAULT_ID_PROPERTY) => {
						Some(DEFAULT_ID_PROPERTY.to_string())
					}
					None => None,
				};

				for (property, _) in T::FAMILIES {
					if !fields.contains(property) {
						return Err(Error::InvalidArgument(format!(
							"column family declared for unknown property `{}` of {}",
							property, type_name
						)));
					}
				}

				let properties: Vec<PropertyMeta> = fields
					.iter()
					.filter(|field| id_property.as_deref() != Some(**field))
					.map(|field| PropertyMeta {
						name: field.to_string(),
						column: policy.translate(field),
						family: T::FAMILIES
							.iter()
							.find(|(property, _)| property == field)
							.map(|(_, family)| family.to_string()),
					})
					.collect();

				let by_property = properties
					.iter()
					.enumerate()
					.map(|(i, p)| (p.name.clone(), i))
					.collect();
				let by_column = properties
					.iter()
					.enumerate()
					.map(|(i, p)| (p.column.clone(), i))
					.collect();

				Ok(Self {
					name: T::NAME.unwrap_or(name).to_string(),
					type_name,
					kind: EntityKind::Struct,
					policy,
					id_column: id_property.as_deref().map(|p| policy.translate(p)),
					id_property,
					default_family: T::COLUMN_FAMILY.map(str::to_string),
					properties,
					by_property,
					by_column,
				})
			}
			EntityShape::Map => {
				let id_property = T::ID_PROPERTY.unwrap_or(DEFAULT_ID_PROPERTY).to_string();
				Ok(Self {
					name: T::NAME.unwrap_or("map").to_string(),
					type_name,
					kind: EntityKind::Map,
					policy,
					id_column: Some(id_property.clone()),
					id_property: Some(id_property),
					default_family: T::COLUMN_FAMILY.map(str::to_string),
					properties: Vec::new(),
					by_property: HashMap::new(),
					by_column: HashMap::new(),
				})
			}
			EntityShape::FlattenedStruct => Err(Error::UnsupportedType(format!(
				"{} uses #[serde(flatten)], so its properties cannot be listed",
				type_name
			))),
			EntityShape::Other => Err(Error::UnsupportedType(format!(
				"{} is neither a struct nor a string-keyed map",
				type_name
			))),
		}
	}

	/// Entity name (the `NAME` override, else the struct name)
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Fully qualified Rust type name
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn kind(&self) -> EntityKind {
		self.kind
	}

	pub fn is_map(&self) -> bool {
		self.kind == EntityKind::Map
	}

	pub fn policy(&self) -> NamingPolicy {
		self.policy
	}

	/// Identifier property, if the entity has one
	pub fn id_property(&self) -> Option<&str> {
		self.id_property.as_deref()
	}

	/// Identifier property, or [`Error::MissingId`]
	pub fn require_id(&self) -> Result<&str> {
		self.id_property
			.as_deref()
			.ok_or_else(|| Error::missing_id(self.type_name))
	}

	/// Identifier property translated under the naming policy
	pub fn id_column(&self) -> Option<&str> {
		self.id_column.as_deref()
	}

	/// Default column family declared on the entity
	pub fn default_family(&self) -> Option<&str> {
		self.default_family.as_deref()
	}

	/// Non-identifier properties in declaration order (empty for maps)
	pub fn properties(&self) -> &[PropertyMeta] {
		&self.properties
	}

	pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
		self.by_property.get(name).map(|&i| &self.properties[i])
	}

	pub fn property_by_column(&self, column: &str) -> Option<&PropertyMeta> {
		self.by_column.get(column).map(|&i| &self.properties[i])
	}

	/// Column name for a serialized property name.
	///
	/// Map keys are never translated. Struct keys unknown to the metadata
	/// (e.g. from `#[serde(flatten)]`) are translated on the fly.
	pub fn column_of<'a>(&'a self, property: &'a str) -> Cow<'a, str> {
		if self.is_map() {
			return Cow::Borrowed(property);
		}
		match self.property(property) {
			Some(meta) => Cow::Borrowed(meta.column.as_str()),
			None if self.id_property() == Some(property) => {
				Cow::Borrowed(self.id_column.as_deref().unwrap_or(property))
			}
			None => Cow::Owned(self.policy.translate(property)),
		}
	}

	/// Property name for a column name; unknown columns are returned as-is.
	pub fn property_of<'a>(&'a self, column: &'a str) -> Cow<'a, str> {
		if self.is_map() {
			return Cow::Borrowed(column);
		}
		match self.property_by_column(column) {
			Some(meta) => Cow::Borrowed(meta.name.as_str()),
			None if self.id_column() == Some(column) => {
				Cow::Borrowed(self.id_property.as_deref().unwrap_or(column))
			}
			None => Cow::Borrowed(column),
		}
	}
}

/// Memoizing store of [`EntityMeta`] keyed by `(type, naming policy)`.
///
/// Entries are never evicted; the number of entity types in a process is
/// small and fixed. Concurrent first lookups may resolve the same metadata
/// twice, but every caller ends up with the one `Arc` that was stored.
#[derive(Debug, Default)]
pub struct EntityRegistry {
	entries: DashMap<(TypeId, NamingPolicy), Arc<EntityMeta>>,
}

impl EntityRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Metadata of `T` under `policy`, resolved on first use.
	///
	/// # Examples
	///
	/// ```
	/// use serde::{Deserialize, Serialize};
	/// use std::sync::Arc;
	/// use tessera_core::{Entity, EntityRegistry, NamingPolicy};
	///
	/// #[derive(Serialize, Deserialize)]
	/// struct User {
	///     id: String,
	///     display_name: String,
	/// }
	/// impl Entity for User {}
	///
	/// let registry = EntityRegistry::new();
	/// let first = registry.meta::<User>(NamingPolicy::LowerCamelCase).unwrap();
	/// let second = registry.meta::<User>(NamingPolicy::LowerCamelCase).unwrap();
	/// assert!(Arc::ptr_eq(&first, &second));
	/// assert_eq!(first.column_of("display_name"), "displayName");
	/// ```
	pub fn meta<T: Entity>(&self, policy: NamingPolicy) -> Result<Arc<EntityMeta>> {
		let key = (TypeId::of::<T>(), policy);
		if let Some(meta) = self.entries.get(&key) {
			return Ok(Arc::clone(meta.value()));
		}

		let resolved = Arc::new(EntityMeta::resolve::<T>(policy)?);
		tracing::trace!(
			entity = resolved.type_name(),
			policy = %policy,
			"resolved entity metadata"
		);
		Ok(Arc::clone(self.entries.entry(key).or_insert(resolved).value()))
	}

	/// Drop every cached entry of `T`, for all policies.
	pub fn invalidate<T: 'static>(&self) {
		let type_id = TypeId::of::<T>();
		self.entries.retain(|(id, _), _| *id != type_id);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde::{Deserialize, Serialize};

	#[derive(Serialize, Deserialize)]
	struct User {
		id: String,
		first_name: String,
		last_login_at: Option<i64>,
	}

	impl Entity for User {}

	#[derive(Serialize, Deserialize)]
	struct Account {
		account_no: String,
		owner: String,
	}

	impl Entity for Account {
		const ID_PROPERTY: Option<&'static str> = Some("account_no");
		const NAME: Option<&'static str> = Some("accounts");
	}

	#[derive(Serialize, Deserialize)]
	struct Anonymous {
		payload: String,
	}

	impl Entity for Anonymous {}

	#[derive(Serialize, Deserialize)]
	struct Misdeclared {
		key: String,
	}

	impl Entity for Misdeclared {
		const ID_PROPERTY: Option<&'static str> = Some("uuid");
	}

	#[derive(Serialize, Deserialize)]
	struct Wrapper(i64);

	impl Entity for Wrapper {}

	#[derive(Serialize, Deserialize)]
	struct Tagged {
		id: String,
		#[serde(flatten)]
		extras: HashMap<String, serde_json::Value>,
	}

	impl Entity for Tagged {}

	#[rstest]
	fn test_convention_id_and_columns() {
		let meta = EntityMeta::resolve::<User>(NamingPolicy::LowerCamelCase).unwrap();
		assert_eq!(meta.name(), "User");
		assert_eq!(meta.kind(), EntityKind::Struct);
		assert_eq!(meta.id_property(), Some("id"));
		assert_eq!(meta.id_column(), Some("id"));
		let columns: Vec<&str> = meta.properties().iter().map(|p| p.column.as_str()).collect();
		assert_eq!(columns, vec!["firstName", "lastLoginAt"]);
		assert_eq!(meta.property_of("firstName"), "first_name");
		assert_eq!(meta.column_of("last_login_at"), "lastLoginAt");
	}

	#[rstest]
	fn test_declared_id_and_name() {
		let meta = EntityMeta::resolve::<Account>(NamingPolicy::UpperCamelCase).unwrap();
		assert_eq!(meta.name(), "accounts");
		assert_eq!(meta.require_id().unwrap(), "account_no");
		assert_eq!(meta.id_column(), Some("AccountNo"));
		assert!(meta.property("account_no").is_none());
	}

	#[rstest]
	fn test_missing_id_fails_on_require() {
		let meta = EntityMeta::resolve::<Anonymous>(NamingPolicy::Preserve).unwrap();
		assert!(meta.id_property().is_none());
		assert!(matches!(meta.require_id(), Err(Error::MissingId { .. })));
	}

	#[rstest]
	fn test_declared_id_must_exist() {
		let err = EntityMeta::resolve::<Misdeclared>(NamingPolicy::Preserve).unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));
	}

	#[rstest]
	fn test_unsupported_shape() {
		let err = EntityMeta::resolve::<Wrapper>(NamingPolicy::Preserve).unwrap_err();
		assert!(matches!(err, Error::UnsupportedType(_)));
	}

	#[rstest]
	fn test_flattened_structs_are_rejected() {
		let registry = EntityRegistry::new();
		let err = registry.meta::<Tagged>(NamingPolicy::SnakeCase).unwrap_err();
		assert!(
			matches!(&err, Error::UnsupportedType(message) if message.contains("flatten")),
			"{:?}",
			err
		);
		assert!(registry.is_empty());
	}

	#[rstest]
	fn test_map_entities_are_not_translated() {
		let meta = EntityMeta::resolve::<serde_json::Map<String, serde_json::Value>>(
			NamingPolicy::SnakeCase,
		)
		.unwrap();
		assert!(meta.is_map());
		assert_eq!(meta.id_property(), Some("id"));
		assert_eq!(meta.column_of("firstName"), "firstName");
	}

	#[rstest]
	fn test_registry_memoizes_per_policy() {
		let registry = EntityRegistry::new();
		let a = registry.meta::<User>(NamingPolicy::SnakeCase).unwrap();
		let b = registry.meta::<User>(NamingPolicy::SnakeCase).unwrap();
		let c = registry.meta::<User>(NamingPolicy::KebabCase).unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert!(!Arc::ptr_eq(&a, &c));
		assert_eq!(registry.len(), 2);

		registry.invalidate::<User>();
		assert!(registry.is_empty());
		let d = registry.meta::<User>(NamingPolicy::SnakeCase).unwrap();
		assert!(!Arc::ptr_eq(&a, &d));
	}
}

//! Versioned cell values.
//!
//! An entity property of type [`HBaseColumn<T>`] receives the newest cell
//! version together with its timestamp; a property of type [`Versions<T>`]
//! receives every version returned by the read, newest first. On write the
//! versions become cells at those timestamps (version `0` lets the server
//! assign the time).
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tessera_hbase::{HBaseColumn, Versions};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Account {
//!     id: String,
//!     balance: HBaseColumn<i64>,
//!     status_history: Versions<String>,
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Struct name identifying [`HBaseColumn`] during type inspection
pub(crate) const COLUMN_MARKER: &str = "$tessera::HBaseColumn";
/// Struct name identifying [`Versions`] during type inspection
pub(crate) const VERSIONS_MARKER: &str = "$tessera::Versions";

/// A cell value and its version timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "$tessera::HBaseColumn")]
pub struct HBaseColumn<T> {
	pub value: T,
	#[serde(default)]
	pub version: u64,
}

impl<T> HBaseColumn<T> {
	/// A value without a version; the server assigns one on write.
	pub fn new(value: T) -> Self {
		Self { value, version: 0 }
	}

	pub fn at(value: T, version: u64) -> Self {
		Self { value, version }
	}

	pub fn value(&self) -> &T {
		&self.value
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn into_value(self) -> T {
		self.value
	}
}

/// The versions of one cell, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "$tessera::Versions")]
pub struct Versions<T> {
	#[serde(default = "Vec::new")]
	values: Vec<HBaseColumn<T>>,
}

impl<T> Default for Versions<T> {
	fn default() -> Self {
		Self { values: Vec::new() }
	}
}

impl<T> Versions<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a version, keeping newest-first order.
	pub fn push(&mut self, column: HBaseColumn<T>) {
		let position = self
			.values
			.iter()
			.position(|existing| existing.version < column.version)
			.unwrap_or(self.values.len());
		self.values.insert(position, column);
	}

	pub fn latest(&self) -> Option<&HBaseColumn<T>> {
		self.values.first()
	}

	/// Newest version at or before `version`.
	pub fn at(&self, version: u64) -> Option<&HBaseColumn<T>> {
		self.values.iter().find(|column| column.version <= version)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, HBaseColumn<T>> {
		self.values.iter()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl<T> FromIterator<HBaseColumn<T>> for Versions<T> {
	fn from_iter<I: IntoIterator<Item = HBaseColumn<T>>>(iter: I) -> Self {
		let mut versions = Self::new();
		for column in iter {
			versions.push(column);
		}
		versions
	}
}

impl<T> IntoIterator for Versions<T> {
	type Item = HBaseColumn<T>;
	type IntoIter = std::vec::IntoIter<HBaseColumn<T>>;

	fn into_iter(self) -> Self::IntoIter {
		self.values.into_iter()
	}
}

impl<'a, T> IntoIterator for &'a Versions<T> {
	type Item = &'a HBaseColumn<T>;
	type IntoIter = std::slice::Iter<'a, HBaseColumn<T>>;

	fn into_iter(self) -> Self::IntoIter {
		self.values.iter()
	}
}

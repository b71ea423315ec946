//! Typed builders over the native byte-level operations.
//!
//! Rows, families and qualifiers accept anything implementing
//! [`CellKey`]; cell values accept any serializable value and are encoded
//! with [`CellCodec`].
//!
//! ```
//! use tessera_hbase::{AnyGet, AnyPut, Get, Put};
//!
//! let put: Put = AnyPut::new("user#1")
//!     .add_column("info", "name", &"Alice")?
//!     .add_column("info", "age", &30)?
//!     .into();
//! assert_eq!(put.columns.len(), 2);
//!
//! let get: Get = AnyGet::new(42u64).add_family("info").max_versions(3).into();
//! assert_eq!(get.row.as_ref(), b"42");
//! # Ok::<(), tessera_core::Error>(())
//! ```

use serde::Serialize;
use tessera_core::Result;

use crate::codec::{CellCodec, CellKey};
use crate::model::{Append, Delete, Get, Increment, Put, Scan, TimeRange};

macro_rules! native_conversions {
	($wrapper:ident, $native:ident) => {
		impl $wrapper {
			/// The native operation
			pub fn into_inner(self) -> $native {
				self.0
			}

			pub fn inner(&self) -> &$native {
				&self.0
			}
		}

		impl From<$wrapper> for $native {
			fn from(wrapper: $wrapper) -> Self {
				wrapper.0
			}
		}

		impl From<$native> for $wrapper {
			fn from(native: $native) -> Self {
				Self(native)
			}
		}
	};
}

/// Typed [`Get`]
#[derive(Debug, Clone)]
pub struct AnyGet(Get);

impl AnyGet {
	pub fn new(row: impl CellKey) -> Self {
		Self(Get::new(row.to_key_bytes()))
	}

	pub fn add_family(self, family: impl CellKey) -> Self {
		Self(self.0.add_family(family.to_key_bytes()))
	}

	pub fn add_column(self, family: impl CellKey, qualifier: impl CellKey) -> Self {
		Self(
			self.0
				.add_column(family.to_key_bytes(), qualifier.to_key_bytes()),
		)
	}

	pub fn max_versions(self, versions: u32) -> Self {
		Self(self.0.max_versions(versions))
	}

	pub fn time_range(self, min: u64, max: u64) -> Result<Self> {
		Ok(Self(self.0.time_range(TimeRange::new(min, max)?)))
	}

	pub fn time_stamp(self, timestamp: u64) -> Self {
		Self(self.0.time_range(TimeRange::at(timestamp)))
	}
}

native_conversions!(AnyGet, Get);

/// Typed [`Put`]
#[derive(Debug, Clone)]
pub struct AnyPut(Put);

impl AnyPut {
	pub fn new(row: impl CellKey) -> Self {
		Self(Put::new(row.to_key_bytes()))
	}

	pub fn add_column<V: Serialize + ?Sized>(
		self,
		family: impl CellKey,
		qualifier: impl CellKey,
		value: &V,
	) -> Result<Self> {
		Ok(Self(self.0.add_column(
			family.to_key_bytes(),
			qualifier.to_key_bytes(),
			CellCodec::encode(value)?,
		)))
	}

	pub fn add_column_at<V: Serialize + ?Sized>(
		self,
		family: impl CellKey,
		qualifier: impl CellKey,
		timestamp: u64,
		value: &V,
	) -> Result<Self> {
		Ok(Self(self.0.add_column_at(
			family.to_key_bytes(),
			qualifier.to_key_bytes(),
			timestamp,
			CellCodec::encode(value)?,
		)))
	}
}

native_conversions!(AnyPut, Put);

/// Typed [`Delete`]
#[derive(Debug, Clone)]
pub struct AnyDelete(Delete);

impl AnyDelete {
	pub fn new(row: impl CellKey) -> Self {
		Self(Delete::new(row.to_key_bytes()))
	}

	pub fn add_family(self, family: impl CellKey) -> Self {
		Self(self.0.add_family(family.to_key_bytes()))
	}

	pub fn add_column(self, family: impl CellKey, qualifier: impl CellKey) -> Self {
		Self(
			self.0
				.add_column(family.to_key_bytes(), qualifier.to_key_bytes()),
		)
	}

	pub fn timestamp(self, timestamp: u64) -> Self {
		Self(self.0.timestamp(timestamp))
	}
}

native_conversions!(AnyDelete, Delete);

/// Typed [`Append`]
#[derive(Debug, Clone)]
pub struct AnyAppend(Append);

impl AnyAppend {
	pub fn new(row: impl CellKey) -> Self {
		Self(Append::new(row.to_key_bytes()))
	}

	/// Append the UTF-8 bytes of `suffix`.
	pub fn add_column(self, family: impl CellKey, qualifier: impl CellKey, suffix: &str) -> Self {
		Self(self.0.add_column(
			family.to_key_bytes(),
			qualifier.to_key_bytes(),
			suffix.to_key_bytes(),
		))
	}
}

native_conversions!(AnyAppend, Append);

/// Typed [`Increment`]
#[derive(Debug, Clone)]
pub struct AnyIncrement(Increment);

impl AnyIncrement {
	pub fn new(row: impl CellKey) -> Self {
		Self(Increment::new(row.to_key_bytes()))
	}

	pub fn add_column(self, family: impl CellKey, qualifier: impl CellKey, amount: i64) -> Self {
		Self(
			self.0
				.add_column(family.to_key_bytes(), qualifier.to_key_bytes(), amount),
		)
	}
}

native_conversions!(AnyIncrement, Increment);

/// Typed [`Scan`]
#[derive(Debug, Clone)]
pub struct AnyScan(Scan);

impl Default for AnyScan {
	fn default() -> Self {
		Self::new()
	}
}

impl AnyScan {
	pub fn new() -> Self {
		Self(Scan::new())
	}

	pub fn with_prefix(prefix: impl CellKey) -> Self {
		Self(Scan::with_prefix(prefix.to_key_bytes()))
	}

	pub fn start_row(self, row: impl CellKey) -> Self {
		Self(self.0.start_row(row.to_key_bytes()))
	}

	pub fn stop_row(self, row: impl CellKey) -> Self {
		Self(self.0.stop_row(row.to_key_bytes()))
	}

	pub fn add_family(self, family: impl CellKey) -> Self {
		Self(self.0.add_family(family.to_key_bytes()))
	}

	pub fn add_column(self, family: impl CellKey, qualifier: impl CellKey) -> Self {
		Self(
			self.0
				.add_column(family.to_key_bytes(), qualifier.to_key_bytes()),
		)
	}

	pub fn max_versions(self, versions: u32) -> Self {
		Self(self.0.max_versions(versions))
	}

	pub fn time_range(self, min: u64, max: u64) -> Result<Self> {
		Ok(Self(self.0.time_range(TimeRange::new(min, max)?)))
	}

	pub fn limit(self, limit: usize) -> Self {
		Self(self.0.limit(limit))
	}

	pub fn caching(self, rows: u32) -> Self {
		Self(self.0.caching(rows))
	}
}

native_conversions!(AnyScan, Scan);

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_put_encodes_values() {
		let put: Put = AnyPut::new("user#1")
			.add_column("info", "name", &"Alice")
			.unwrap()
			.add_column_at("info", "scores", 5, &json!([1, 2]))
			.unwrap()
			.into();
		assert_eq!(put.row.as_ref(), b"user#1");
		assert_eq!(put.columns[0].value.as_ref(), b"Alice");
		assert_eq!(put.columns[1].timestamp, Some(5));
		assert_eq!(put.columns[1].value.as_ref(), b"[1,2]");
	}

	#[rstest]
	fn test_scan_and_get_options() {
		let scan: Scan = AnyScan::with_prefix("user#")
			.add_column("info", "name")
			.limit(10)
			.into();
		assert_eq!(scan.start_row.as_deref(), Some(b"user#".as_slice()));
		assert_eq!(scan.limit, Some(10));

		assert!(AnyGet::new("r").time_range(10, 1).is_err());
		let get = AnyGet::new(7i32).time_stamp(3).into_inner();
		assert!(get.selects(b"any", b"q", 3));
		assert!(!get.selects(b"any", b"q", 4));
	}

	#[rstest]
	fn test_delete_increment_append() {
		let delete: Delete = AnyDelete::new("r").add_family("info").timestamp(9).into();
		assert_eq!(delete.timestamp, Some(9));
		let increment: Increment = AnyIncrement::new("r").add_column("stats", "hits", 2).into();
		assert_eq!(increment.columns[0].2, 2);
		let append: Append = AnyAppend::new("r").add_column("log", "", "x").into();
		assert_eq!(append.columns[0].2.as_ref(), b"x");
	}
}

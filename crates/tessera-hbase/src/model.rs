//! Native byte-level request and result types.
//!
//! These mirror the HBase client objects: every row key, family, qualifier
//! and value is raw bytes. The typed wrappers in [`crate::any`] build them
//! from ordinary Rust values.

use bytes::Bytes;
use tessera_core::{Error, Result};

/// Number of versions meaning "all stored versions"
pub const ALL_VERSIONS: u32 = u32::MAX;

/// One stored cell version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
	pub row: Bytes,
	pub family: Bytes,
	pub qualifier: Bytes,
	pub timestamp: u64,
	pub value: Bytes,
}

/// The cells of one row, grouped by column with the newest version first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowResult {
	row: Bytes,
	cells: Vec<Cell>,
}

impl RowResult {
	pub fn new(row: impl Into<Bytes>, mut cells: Vec<Cell>) -> Self {
		cells.sort_by(|a, b| {
			a.family
				.cmp(&b.family)
				.then_with(|| a.qualifier.cmp(&b.qualifier))
				.then_with(|| b.timestamp.cmp(&a.timestamp))
		});
		Self {
			row: row.into(),
			cells,
		}
	}

	/// Result of a get on an absent row
	pub fn empty(row: impl Into<Bytes>) -> Self {
		Self::new(row, Vec::new())
	}

	pub fn row(&self) -> &Bytes {
		&self.row
	}

	pub fn cells(&self) -> &[Cell] {
		&self.cells
	}

	pub fn is_empty(&self) -> bool {
		self.cells.is_empty()
	}

	/// Newest value of a column
	pub fn value<'a>(&'a self, family: &[u8], qualifier: &[u8]) -> Option<&'a Bytes> {
		self.cells
			.iter()
			.find(|cell| cell.family == family && cell.qualifier == qualifier)
			.map(|cell| &cell.value)
	}

	/// Versions of a column, newest first
	pub fn column_cells<'a, 'k>(
		&'a self,
		family: &'k [u8],
		qualifier: &'k [u8],
	) -> impl Iterator<Item = &'a Cell> + use<'a, 'k> {
		self.cells
			.iter()
			.filter(move |cell| cell.family == family && cell.qualifier == qualifier)
	}

	/// Cells grouped per `(family, qualifier)`, each group newest first
	pub fn columns(&self) -> Vec<&[Cell]> {
		self.cells
			.chunk_by(|a, b| a.family == b.family && a.qualifier == b.qualifier)
			.collect()
	}
}

/// Half-open timestamp interval `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
	min: u64,
	max: u64,
}

impl TimeRange {
	pub fn new(min: u64, max: u64) -> Result<Self> {
		if min > max {
			return Err(Error::InvalidArgument(format!(
				"time range start {} is after its end {}",
				min, max
			)));
		}
		Ok(Self { min, max })
	}

	/// Every timestamp
	pub fn all() -> Self {
		Self { min: 0, max: u64::MAX }
	}

	/// Exactly one timestamp
	pub fn at(timestamp: u64) -> Self {
		Self {
			min: timestamp,
			max: timestamp.saturating_add(1),
		}
	}

	pub fn min(&self) -> u64 {
		self.min
	}

	pub fn max(&self) -> u64 {
		self.max
	}

	pub fn contains(&self, timestamp: u64) -> bool {
		self.min <= timestamp && timestamp < self.max
	}
}

impl Default for TimeRange {
	fn default() -> Self {
		Self::all()
	}
}

/// A family, optionally narrowed to one qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelector {
	pub family: Bytes,
	pub qualifier: Option<Bytes>,
}

impl ColumnSelector {
	pub fn matches(&self, family: &[u8], qualifier: &[u8]) -> bool {
		self.family == family && self.qualifier.as_ref().is_none_or(|q| q == qualifier)
	}
}

fn selected(columns: &[ColumnSelector], family: &[u8], qualifier: &[u8]) -> bool {
	columns.is_empty() || columns.iter().any(|c| c.matches(family, qualifier))
}

/// Read of a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Get {
	pub row: Bytes,
	pub columns: Vec<ColumnSelector>,
	pub max_versions: u32,
	pub time_range: Option<TimeRange>,
}

impl Get {
	pub fn new(row: impl Into<Bytes>) -> Self {
		Self {
			row: row.into(),
			columns: Vec::new(),
			max_versions: 1,
			time_range: None,
		}
	}

	pub fn add_family(mut self, family: impl Into<Bytes>) -> Self {
		self.columns.push(ColumnSelector {
			family: family.into(),
			qualifier: None,
		});
		self
	}

	pub fn add_column(mut self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
		self.columns.push(ColumnSelector {
			family: family.into(),
			qualifier: Some(qualifier.into()),
		});
		self
	}

	pub fn max_versions(mut self, versions: u32) -> Self {
		self.max_versions = versions.max(1);
		self
	}

	pub fn time_range(mut self, range: TimeRange) -> Self {
		self.time_range = Some(range);
		self
	}

	/// Whether a stored cell is covered by the column and time filters.
	pub fn selects(&self, family: &[u8], qualifier: &[u8], timestamp: u64) -> bool {
		selected(&self.columns, family, qualifier)
			&& self.time_range.is_none_or(|range| range.contains(timestamp))
	}
}

/// One cell write of a [`Put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutColumn {
	pub family: Bytes,
	pub qualifier: Bytes,
	/// Server time when `None`
	pub timestamp: Option<u64>,
	pub value: Bytes,
}

/// Write of one or more cells of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
	pub row: Bytes,
	pub columns: Vec<PutColumn>,
}

impl Put {
	pub fn new(row: impl Into<Bytes>) -> Self {
		Self {
			row: row.into(),
			columns: Vec::new(),
		}
	}

	pub fn add_column(
		mut self,
		family: impl Into<Bytes>,
		qualifier: impl Into<Bytes>,
		value: impl Into<Bytes>,
	) -> Self {
		self.columns.push(PutColumn {
			family: family.into(),
			qualifier: qualifier.into(),
			timestamp: None,
			value: value.into(),
		});
		self
	}

	pub fn add_column_at(
		mut self,
		family: impl Into<Bytes>,
		qualifier: impl Into<Bytes>,
		timestamp: u64,
		value: impl Into<Bytes>,
	) -> Self {
		self.columns.push(PutColumn {
			family: family.into(),
			qualifier: qualifier.into(),
			timestamp: Some(timestamp),
			value: value.into(),
		});
		self
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}
}

/// Removal of a row, some of its families or some of its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
	pub row: Bytes,
	/// Whole row when empty
	pub columns: Vec<ColumnSelector>,
	/// Only versions at or before this timestamp when set
	pub timestamp: Option<u64>,
}

impl Delete {
	pub fn new(row: impl Into<Bytes>) -> Self {
		Self {
			row: row.into(),
			columns: Vec::new(),
			timestamp: None,
		}
	}

	pub fn add_family(mut self, family: impl Into<Bytes>) -> Self {
		self.columns.push(ColumnSelector {
			family: family.into(),
			qualifier: None,
		});
		self
	}

	pub fn add_column(mut self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
		self.columns.push(ColumnSelector {
			family: family.into(),
			qualifier: Some(qualifier.into()),
		});
		self
	}

	pub fn timestamp(mut self, timestamp: u64) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	/// Whether a stored cell is removed by this delete.
	pub fn removes(&self, family: &[u8], qualifier: &[u8], timestamp: u64) -> bool {
		selected(&self.columns, family, qualifier)
			&& self.timestamp.is_none_or(|limit| timestamp <= limit)
	}
}

/// Server-side append to existing cell values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Append {
	pub row: Bytes,
	pub columns: Vec<(Bytes, Bytes, Bytes)>,
}

impl Append {
	pub fn new(row: impl Into<Bytes>) -> Self {
		Self {
			row: row.into(),
			columns: Vec::new(),
		}
	}

	pub fn add_column(
		mut self,
		family: impl Into<Bytes>,
		qualifier: impl Into<Bytes>,
		value: impl Into<Bytes>,
	) -> Self {
		self.columns
			.push((family.into(), qualifier.into(), value.into()));
		self
	}
}

/// Server-side increment of 64-bit counter cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
	pub row: Bytes,
	pub columns: Vec<(Bytes, Bytes, i64)>,
}

impl Increment {
	pub fn new(row: impl Into<Bytes>) -> Self {
		Self {
			row: row.into(),
			columns: Vec::new(),
		}
	}

	pub fn add_column(
		mut self,
		family: impl Into<Bytes>,
		qualifier: impl Into<Bytes>,
		amount: i64,
	) -> Self {
		self.columns.push((family.into(), qualifier.into(), amount));
		self
	}
}

/// Range read over rows in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
	/// Inclusive
	pub start_row: Option<Bytes>,
	/// Exclusive
	pub stop_row: Option<Bytes>,
	pub columns: Vec<ColumnSelector>,
	pub max_versions: u32,
	pub time_range: Option<TimeRange>,
	pub limit: Option<usize>,
	/// Rows fetched per round trip
	pub caching: Option<u32>,
}

impl Scan {
	pub fn new() -> Self {
		Self {
			max_versions: 1,
			..Self::default()
		}
	}

	/// Rows whose key starts with `prefix`.
	pub fn with_prefix(prefix: impl Into<Bytes>) -> Self {
		let prefix = prefix.into();
		Self {
			stop_row: prefix_stop(&prefix),
			start_row: Some(prefix),
			..Self::new()
		}
	}

	pub fn start_row(mut self, row: impl Into<Bytes>) -> Self {
		self.start_row = Some(row.into());
		self
	}

	pub fn stop_row(mut self, row: impl Into<Bytes>) -> Self {
		self.stop_row = Some(row.into());
		self
	}

	pub fn add_family(mut self, family: impl Into<Bytes>) -> Self {
		self.columns.push(ColumnSelector {
			family: family.into(),
			qualifier: None,
		});
		self
	}

	pub fn add_column(mut self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
		self.columns.push(ColumnSelector {
			family: family.into(),
			qualifier: Some(qualifier.into()),
		});
		self
	}

	pub fn max_versions(mut self, versions: u32) -> Self {
		self.max_versions = versions.max(1);
		self
	}

	pub fn time_range(mut self, range: TimeRange) -> Self {
		self.time_range = Some(range);
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn caching(mut self, rows: u32) -> Self {
		self.caching = Some(rows);
		self
	}

	/// Whether `row` lies within `[start_row, stop_row)`.
	pub fn covers_row(&self, row: &[u8]) -> bool {
		self.start_row.as_ref().is_none_or(|start| row >= start.as_ref())
			&& self.stop_row.as_ref().is_none_or(|stop| row < stop.as_ref())
	}

	/// Whether a stored cell is covered by the column and time filters.
	pub fn selects(&self, family: &[u8], qualifier: &[u8], timestamp: u64) -> bool {
		selected(&self.columns, family, qualifier)
			&& self.time_range.is_none_or(|range| range.contains(timestamp))
	}
}

/// First key after every key starting with `prefix`; `None` when unbounded.
fn prefix_stop(prefix: &[u8]) -> Option<Bytes> {
	let mut stop = prefix.to_vec();
	while let Some(last) = stop.pop() {
		if last < u8::MAX {
			stop.push(last + 1);
			return Some(Bytes::from(stop));
		}
	}
	None
}

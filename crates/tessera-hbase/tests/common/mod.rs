//! In-memory table used by the executor tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tessera_core::{Error, Result};
use tessera_hbase::{
	Append, Cell, CellCodec, Delete, Get, Increment, Put, RowResult, Scan, Table, TableProvider,
};

/// A table keeping every written version.
pub struct MemoryTable {
	name: String,
	rows: Mutex<BTreeMap<Bytes, Vec<Cell>>>,
	clock: AtomicU64,
	pub gets: Mutex<Vec<Get>>,
	pub scans: Mutex<Vec<Scan>>,
}

impl MemoryTable {
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_string(),
			rows: Mutex::new(BTreeMap::new()),
			clock: AtomicU64::new(1000),
			gets: Mutex::new(Vec::new()),
			scans: Mutex::new(Vec::new()),
		}
	}

	fn tick(&self) -> u64 {
		self.clock.fetch_add(1, Ordering::SeqCst)
	}

	/// Store a raw cell, bypassing the executor.
	pub fn insert_cell(&self, row: &str, family: &str, qualifier: &str, timestamp: u64, value: &[u8]) {
		let row = Bytes::copy_from_slice(row.as_bytes());
		self.rows.lock().entry(row.clone()).or_default().push(Cell {
			row,
			family: Bytes::copy_from_slice(family.as_bytes()),
			qualifier: Bytes::copy_from_slice(qualifier.as_bytes()),
			timestamp,
			value: Bytes::copy_from_slice(value),
		});
	}

	pub fn row(&self, row: &str) -> RowResult {
		let rows = self.rows.lock();
		let cells = rows.get(row.as_bytes()).cloned().unwrap_or_default();
		RowResult::new(Bytes::copy_from_slice(row.as_bytes()), cells)
	}

	pub fn row_count(&self) -> usize {
		self.rows.lock().len()
	}
}

/// Keep the newest `max_versions` cells of every column.
fn newest(row: Bytes, cells: Vec<Cell>, max_versions: u32) -> RowResult {
	let sorted = RowResult::new(row.clone(), cells);
	let mut kept = Vec::new();
	for column in sorted.columns() {
		kept.extend(column.iter().take(max_versions as usize).cloned());
	}
	RowResult::new(row, kept)
}

#[async_trait]
impl Table for MemoryTable {
	fn name(&self) -> &str {
		&self.name
	}

	async fn get(&self, get: Get) -> Result<RowResult> {
		self.gets.lock().push(get.clone());
		let rows = self.rows.lock();
		let cells = rows
			.get(&get.row)
			.map(|cells| {
				cells
					.iter()
					.filter(|c| get.selects(&c.family, &c.qualifier, c.timestamp))
					.cloned()
					.collect()
			})
			.unwrap_or_default();
		Ok(newest(get.row.clone(), cells, get.max_versions))
	}

	async fn put(&self, put: Put) -> Result<()> {
		let now = self.tick();
		let mut rows = self.rows.lock();
		let cells = rows.entry(put.row.clone()).or_default();
		for column in put.columns {
			let timestamp = column.timestamp.unwrap_or(now);
			cells.retain(|c| {
				!(c.family == column.family && c.qualifier == column.qualifier && c.timestamp == timestamp)
			});
			cells.push(Cell {
				row: put.row.clone(),
				family: column.family,
				qualifier: column.qualifier,
				timestamp,
				value: column.value,
			});
		}
		Ok(())
	}

	async fn delete(&self, delete: Delete) -> Result<()> {
		let mut rows = self.rows.lock();
		if let Some(cells) = rows.get_mut(&delete.row) {
			cells.retain(|c| !delete.removes(&c.family, &c.qualifier, c.timestamp));
			if cells.is_empty() {
				rows.remove(&delete.row);
			}
		}
		Ok(())
	}

	async fn append(&self, append: Append) -> Result<RowResult> {
		let now = self.tick();
		let mut rows = self.rows.lock();
		let cells = rows.entry(append.row.clone()).or_default();
		let mut written = Vec::new();
		for (family, qualifier, suffix) in append.columns {
			let mut value = cells
				.iter()
				.filter(|c| c.family == family && c.qualifier == qualifier)
				.max_by_key(|c| c.timestamp)
				.map(|c| c.value.to_vec())
				.unwrap_or_default();
			value.extend_from_slice(&suffix);
			let cell = Cell {
				row: append.row.clone(),
				family,
				qualifier,
				timestamp: now,
				value: Bytes::from(value),
			};
			cells.push(cell.clone());
			written.push(cell);
		}
		Ok(RowResult::new(append.row, written))
	}

	async fn increment(&self, increment: Increment) -> Result<RowResult> {
		let now = self.tick();
		let mut rows = self.rows.lock();
		let cells = rows.entry(increment.row.clone()).or_default();
		let mut written = Vec::new();
		for (family, qualifier, amount) in increment.columns {
			let current = match cells
				.iter()
				.filter(|c| c.family == family && c.qualifier == qualifier)
				.max_by_key(|c| c.timestamp)
			{
				Some(cell) => CellCodec::decode_counter(&cell.value)
					.map_err(|e| Error::driver("hbase", e))?,
				None => 0,
			};
			let cell = Cell {
				row: increment.row.clone(),
				family,
				qualifier,
				timestamp: now,
				value: CellCodec::encode_counter(current + amount),
			};
			cells.push(cell.clone());
			written.push(cell);
		}
		Ok(RowResult::new(increment.row, written))
	}

	async fn scan(&self, scan: Scan) -> Result<Vec<RowResult>> {
		self.scans.lock().push(scan.clone());
		let rows = self.rows.lock();
		let mut results = Vec::new();
		for (row, cells) in rows.iter() {
			if !scan.covers_row(row) {
				continue;
			}
			let cells: Vec<Cell> = cells
				.iter()
				.filter(|c| scan.selects(&c.family, &c.qualifier, c.timestamp))
				.cloned()
				.collect();
			if cells.is_empty() {
				continue;
			}
			results.push(newest(row.clone(), cells, scan.max_versions));
			if scan.limit.is_some_and(|limit| results.len() >= limit) {
				break;
			}
		}
		Ok(results)
	}
}

/// Provider creating tables on first use.
#[derive(Default)]
pub struct MemoryProvider {
	tables: Mutex<HashMap<String, Arc<MemoryTable>>>,
}

impl MemoryProvider {
	pub fn memory_table(&self, name: &str) -> Arc<MemoryTable> {
		self.tables
			.lock()
			.entry(name.to_string())
			.or_insert_with(|| Arc::new(MemoryTable::new(name)))
			.clone()
	}
}

impl TableProvider for MemoryProvider {
	fn table(&self, name: &str) -> Result<Arc<dyn Table>> {
		Ok(self.memory_table(name))
	}
}

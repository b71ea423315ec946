//! Native table seam.

use std::sync::Arc;

use async_trait::async_trait;
use tessera_core::Result;

use crate::model::{Append, Delete, Get, Increment, Put, RowResult, Scan};

/// Backend name used in driver errors
pub const BACKEND: &str = "hbase";

/// Access to one table.
///
/// Only the single-row operations and `scan` are required; the batch
/// variants default to issuing them one by one.
#[async_trait]
pub trait Table: Send + Sync {
	fn name(&self) -> &str;

	/// Read one row; an absent row yields an empty [`RowResult`].
	async fn get(&self, get: Get) -> Result<RowResult>;

	async fn get_many(&self, gets: Vec<Get>) -> Result<Vec<RowResult>> {
		let mut results = Vec::with_capacity(gets.len());
		for get in gets {
			results.push(self.get(get).await?);
		}
		Ok(results)
	}

	async fn exists(&self, get: Get) -> Result<bool> {
		Ok(!self.get(get).await?.is_empty())
	}

	async fn put(&self, put: Put) -> Result<()>;

	async fn put_many(&self, puts: Vec<Put>) -> Result<()> {
		for put in puts {
			self.put(put).await?;
		}
		Ok(())
	}

	async fn delete(&self, delete: Delete) -> Result<()>;

	async fn delete_many(&self, deletes: Vec<Delete>) -> Result<()> {
		for delete in deletes {
			self.delete(delete).await?;
		}
		Ok(())
	}

	/// Append to cell values; returns the resulting cells.
	async fn append(&self, append: Append) -> Result<RowResult>;

	/// Add to 64-bit big-endian counters; returns the resulting cells.
	async fn increment(&self, increment: Increment) -> Result<RowResult>;

	async fn scan(&self, scan: Scan) -> Result<Vec<RowResult>>;
}

/// Opens tables by name.
pub trait TableProvider: Send + Sync {
	fn table(&self, name: &str) -> Result<Arc<dyn Table>>;
}

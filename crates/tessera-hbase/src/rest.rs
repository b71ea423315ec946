//! HBase REST gateway adapter
//!
//! [`RestTableProvider`] opens [`RestTable`]s speaking the gateway's JSON
//! cell-set protocol: row keys, columns (`family:qualifier`) and values are
//! base64 encoded in bodies and percent-encoded in paths. Scans go through
//! a server-side scanner that is always released.
//!
//! The gateway has no append or increment endpoint; both report a driver
//! error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, percent_encode};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use tessera_core::{Error, Result};

use crate::model::{
	ALL_VERSIONS, Append, Cell, ColumnSelector, Delete, Get, Increment, Put, RowResult, Scan,
};
use crate::table::{BACKEND, Table, TableProvider};

const JSON: &str = "application/json";

/// Connection settings for [`RestTableProvider`]
#[derive(Debug, Clone)]
pub struct RestTableConfig {
	/// Gateway base URL, e.g. `http://localhost:8080`
	pub base_url: String,
	/// Namespace prefix prepended to table names, e.g. `"prod"`
	pub namespace: Option<String>,
	/// HTTP timeout of a single request
	pub timeout: Option<Duration>,
	/// Rows fetched per scanner round trip
	pub scanner_batch: u32,
}

impl RestTableConfig {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			namespace: None,
			timeout: None,
			scanner_batch: 100,
		}
	}

	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into());
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn scanner_batch(mut self, rows: u32) -> Self {
		self.scanner_batch = rows;
		self
	}
}

/// Opens gateway-backed tables sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct RestTableProvider {
	client: reqwest::Client,
	config: RestTableConfig,
}

impl RestTableProvider {
	pub fn new(config: RestTableConfig) -> Result<Self> {
		if config.scanner_batch == 0 {
			return Err(Error::Config("scanner batch must be at least 1".to_string()));
		}
		let mut builder = reqwest::Client::builder();
		if let Some(timeout) = config.timeout {
			builder = builder.timeout(timeout);
		}
		let client = builder
			.build()
			.map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;
		Ok(Self { client, config })
	}
}

impl TableProvider for RestTableProvider {
	fn table(&self, name: &str) -> Result<Arc<dyn Table>> {
		if name.is_empty() {
			return Err(Error::InvalidArgument("table name must not be empty".to_string()));
		}
		let qualified = match &self.config.namespace {
			Some(namespace) => format!("{}:{}", namespace, name),
			None => name.to_string(),
		};
		Ok(Arc::new(RestTable {
			client: self.client.clone(),
			base: format!(
				"{}/{}",
				self.config.base_url.trim_end_matches('/'),
				encode_path(qualified.as_bytes())
			),
			name: name.to_string(),
			scanner_batch: self.config.scanner_batch,
		}))
	}
}

/// One table behind the gateway.
#[derive(Debug, Clone)]
pub struct RestTable {
	client: reqwest::Client,
	/// `{base_url}/{table}`
	base: String,
	name: String,
	scanner_batch: u32,
}

// Wire model of the gateway's JSON representation

#[derive(Debug, Default, Serialize, Deserialize)]
struct CellSetModel {
	#[serde(rename = "Row", default)]
	rows: Vec<RowModel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowModel {
	key: String,
	#[serde(rename = "Cell", default)]
	cells: Vec<CellModel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellModel {
	column: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	timestamp: Option<u64>,
	#[serde(rename = "$")]
	value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScannerModel {
	#[serde(skip_serializing_if = "Option::is_none")]
	start_row: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	end_row: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	column: Vec<String>,
	batch: u32,
	max_versions: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	start_time: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	end_time: Option<u64>,
}

fn encode_path(bytes: &[u8]) -> String {
	percent_encode(bytes, NON_ALPHANUMERIC).to_string()
}

fn column_name(family: &[u8], qualifier: &[u8]) -> Vec<u8> {
	let mut column = Vec::with_capacity(family.len() + qualifier.len() + 1);
	column.extend_from_slice(family);
	column.push(b':');
	column.extend_from_slice(qualifier);
	column
}

fn selector_name(selector: &ColumnSelector) -> Vec<u8> {
	match &selector.qualifier {
		Some(qualifier) => column_name(&selector.family, qualifier),
		None => selector.family.to_vec(),
	}
}

fn decode_b64(text: &str) -> Result<Bytes> {
	STANDARD
		.decode(text)
		.map(Bytes::from)
		.map_err(|e| Error::driver(BACKEND, format!("malformed base64 in response: {}", e)))
}

/// Cell set body of a put.
fn put_body(put: &Put) -> CellSetModel {
	let cells = put
		.columns
		.iter()
		.map(|column| CellModel {
			column: STANDARD.encode(column_name(&column.family, &column.qualifier)),
			timestamp: column.timestamp,
			value: STANDARD.encode(&column.value),
		})
		.collect();
	CellSetModel {
		rows: vec![RowModel {
			key: STANDARD.encode(&put.row),
			cells,
		}],
	}
}

/// Decode a cell set into row results.
fn decode_cell_set(model: CellSetModel) -> Result<Vec<RowResult>> {
	model
		.rows
		.into_iter()
		.map(|row| {
			let key = decode_b64(&row.key)?;
			let cells = row
				.cells
				.into_iter()
				.map(|cell| {
					let column = decode_b64(&cell.column)?;
					let (family, qualifier) = match column.iter().position(|b| *b == b':') {
						Some(split) => (column.slice(..split), column.slice(split + 1..)),
						None => (column.clone(), Bytes::new()),
					};
					Ok(Cell {
						row: key.clone(),
						family,
						qualifier,
						timestamp: cell.timestamp.unwrap_or(0),
						value: decode_b64(&cell.value)?,
					})
				})
				.collect::<Result<Vec<_>>>()?;
			Ok(RowResult::new(key, cells))
		})
		.collect()
}

fn scanner_body(scan: &Scan, batch: u32) -> ScannerModel {
	let batch = match scan.caching {
		Some(rows) if rows > 0 => rows,
		_ => batch,
	};
	let batch = match scan.limit {
		Some(limit) => batch.min(u32::try_from(limit.max(1)).unwrap_or(u32::MAX)),
		None => batch,
	};
	ScannerModel {
		start_row: scan.start_row.as_ref().map(|row| STANDARD.encode(row)),
		end_row: scan.stop_row.as_ref().map(|row| STANDARD.encode(row)),
		column: scan
			.columns
			.iter()
			.map(|selector| STANDARD.encode(selector_name(selector)))
			.collect(),
		batch,
		max_versions: scan.max_versions,
		start_time: scan.time_range.map(|range| range.min()),
		end_time: scan.time_range.map(|range| range.max()),
	}
}

impl RestTable {
	/// `{table}/{row}[/{columns}]?v={versions}`
	fn row_url(&self, get: &Get) -> String {
		let mut url = format!("{}/{}", self.base, encode_path(&get.row));
		if !get.columns.is_empty() {
			let columns: Vec<String> = get
				.columns
				.iter()
				.map(|selector| encode_path(&selector_name(selector)))
				.collect();
			url.push('/');
			url.push_str(&columns.join(","));
		}
		if get.max_versions > 1 {
			let versions = if get.max_versions == ALL_VERSIONS {
				i32::MAX as u32
			} else {
				get.max_versions
			};
			url.push_str(&format!("?v={}", versions));
		}
		url
	}

	async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		let body = response.text().await.unwrap_or_default();
		Err(Error::driver(BACKEND, format!("HTTP {}: {}", status, body.trim())))
	}

	async fn read_cell_set(response: reqwest::Response) -> Result<Vec<RowResult>> {
		let model = response
			.json::<CellSetModel>()
			.await
			.map_err(|e| Error::driver(BACKEND, e))?;
		decode_cell_set(model)
	}

	async fn scan_pages(&self, scanner: &str, limit: Option<usize>) -> Result<Vec<RowResult>> {
		let mut rows = Vec::new();
		loop {
			let response = self
				.client
				.get(scanner)
				.header(ACCEPT, JSON)
				.send()
				.await
				.map_err(|e| Error::driver(BACKEND, e))?;
			if response.status() == StatusCode::NO_CONTENT {
				return Ok(rows);
			}
			let page = Self::read_cell_set(Self::check(response).await?).await?;
			if page.is_empty() {
				return Ok(rows);
			}
			rows.extend(page);
			if let Some(limit) = limit
				&& rows.len() >= limit
			{
				rows.truncate(limit);
				return Ok(rows);
			}
		}
	}
}

#[async_trait]
impl Table for RestTable {
	fn name(&self) -> &str {
		&self.name
	}

	async fn get(&self, get: Get) -> Result<RowResult> {
		let response = self
			.client
			.get(self.row_url(&get))
			.header(ACCEPT, JSON)
			.send()
			.await
			.map_err(|e| Error::driver(BACKEND, e))?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(RowResult::empty(get.row));
		}
		let rows = Self::read_cell_set(Self::check(response).await?).await?;
		let cells = rows
			.into_iter()
			.flat_map(|row| row.cells().to_vec())
			.filter(|cell| get.selects(&cell.family, &cell.qualifier, cell.timestamp))
			.collect();
		Ok(RowResult::new(get.row, cells))
	}

	async fn put(&self, put: Put) -> Result<()> {
		if put.is_empty() {
			return Ok(());
		}
		let response = self
			.client
			.put(format!("{}/fakerow", self.base))
			.header(CONTENT_TYPE, JSON)
			.header(ACCEPT, JSON)
			.json(&put_body(&put))
			.send()
			.await
			.map_err(|e| Error::driver(BACKEND, e))?;
		Self::check(response).await.map(|_| ())
	}

	async fn delete(&self, delete: Delete) -> Result<()> {
		let row = format!("{}/{}", self.base, encode_path(&delete.row));
		let suffix = delete
			.timestamp
			.map(|timestamp| format!("/{}", timestamp))
			.unwrap_or_default();

		let urls: Vec<String> = if delete.columns.is_empty() {
			match delete.timestamp {
				// a timestamp needs a column path segment
				Some(_) => vec![format!("{}/*{}", row, suffix)],
				None => vec![row],
			}
		} else {
			delete
				.columns
				.iter()
				.map(|selector| format!("{}/{}{}", row, encode_path(&selector_name(selector)), suffix))
				.collect()
		};

		for url in urls {
			let response = self
				.client
				.delete(url)
				.send()
				.await
				.map_err(|e| Error::driver(BACKEND, e))?;
			if response.status() != StatusCode::NOT_FOUND {
				Self::check(response).await?;
			}
		}
		Ok(())
	}

	async fn append(&self, _append: Append) -> Result<RowResult> {
		Err(Error::driver(BACKEND, "append is unsupported by REST gateway"))
	}

	async fn increment(&self, _increment: Increment) -> Result<RowResult> {
		Err(Error::driver(BACKEND, "increment is unsupported by REST gateway"))
	}

	async fn scan(&self, scan: Scan) -> Result<Vec<RowResult>> {
		let response = self
			.client
			.put(format!("{}/scanner", self.base))
			.header(CONTENT_TYPE, JSON)
			.json(&scanner_body(&scan, self.scanner_batch))
			.send()
			.await
			.map_err(|e| Error::driver(BACKEND, e))?;
		let response = Self::check(response).await?;
		let scanner = response
			.headers()
			.get(LOCATION)
			.and_then(|location| location.to_str().ok())
			.map(str::to_string)
			.ok_or_else(|| Error::driver(BACKEND, "scanner created without a location"))?;
		tracing::debug!(table = %self.name, %scanner, "opened scanner");

		let rows = self.scan_pages(&scanner, scan.limit).await;

		if let Err(e) = self.client.delete(&scanner).send().await {
			tracing::warn!(table = %self.name, %scanner, error = %e, "failed to release scanner");
		}
		rows
	}
}

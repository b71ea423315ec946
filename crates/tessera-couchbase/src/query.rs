//! Query requests and responses exchanged with the query service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_core::{Error, Result};

use crate::params::BoundParams;

/// Backend name used in driver errors
pub const BACKEND: &str = "couchbase";

/// Index consistency requested for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanConsistency {
	#[default]
	NotBounded,
	RequestPlus,
}

impl ScanConsistency {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::NotBounded => "not_bounded",
			Self::RequestPlus => "request_plus",
		}
	}
}

/// Per-query options, forwarded to the query service as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
	pub timeout: Option<Duration>,
	pub scan_consistency: Option<ScanConsistency>,
	/// `false` asks the service to prepare and reuse the statement
	pub adhoc: bool,
	pub read_only: bool,
	pub client_context_id: Option<String>,
}

impl Default for QueryOptions {
	fn default() -> Self {
		Self {
			timeout: None,
			scan_consistency: None,
			adhoc: true,
			read_only: false,
			client_context_id: None,
		}
	}
}

impl QueryOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn scan_consistency(mut self, consistency: ScanConsistency) -> Self {
		self.scan_consistency = Some(consistency);
		self
	}

	pub fn adhoc(mut self, adhoc: bool) -> Self {
		self.adhoc = adhoc;
		self
	}

	pub fn read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}

	pub fn client_context_id(mut self, id: impl Into<String>) -> Self {
		self.client_context_id = Some(id.into());
		self
	}
}

/// A statement ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
	pub statement: String,
	pub params: BoundParams,
	pub options: QueryOptions,
}

/// Final status reported by the query service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
	#[default]
	Success,
	Running,
	Errors,
	Completed,
	Stopped,
	Timeout,
	Closed,
	Fatal,
	Aborted,
	#[serde(other)]
	Unknown,
}

/// One entry of the `errors` array of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
	pub code: i64,
	#[serde(rename = "msg")]
	pub message: String,
}

/// Execution metrics of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryMetrics {
	pub elapsed_time: String,
	pub execution_time: String,
	pub result_count: u64,
	pub result_size: u64,
	pub mutation_count: u64,
	pub error_count: u64,
}

/// A query service response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryResponse {
	#[serde(rename = "results")]
	pub rows: Vec<Value>,
	pub status: QueryStatus,
	pub errors: Vec<QueryError>,
	pub metrics: Option<QueryMetrics>,
}

impl QueryResponse {
	/// A successful response carrying `rows`.
	pub fn success(rows: Vec<Value>) -> Self {
		let count = rows.len() as u64;
		Self {
			rows,
			status: QueryStatus::Success,
			errors: Vec::new(),
			metrics: Some(QueryMetrics {
				result_count: count,
				..QueryMetrics::default()
			}),
		}
	}

	pub fn is_success(&self) -> bool {
		self.status == QueryStatus::Success && self.errors.is_empty()
	}

	/// The response itself when successful, else [`Error::Driver`].
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() {
			return Ok(self);
		}
		let message = if self.errors.is_empty() {
			format!("query finished with status {:?}", self.status)
		} else {
			self.errors
				.iter()
				.map(|e| format!("[{}] {}", e.code, e.message))
				.collect::<Vec<_>>()
				.join("; ")
		};
		Err(Error::driver(BACKEND, message))
	}

	/// Rows of a successful response, else [`Error::Driver`].
	pub fn into_rows(self) -> Result<Vec<Value>> {
		self.error_for_status().map(|response| response.rows)
	}

	/// Mutation count reported by the service, if any
	pub fn mutation_count(&self) -> u64 {
		self.metrics.as_ref().map_or(0, |m| m.mutation_count)
	}
}

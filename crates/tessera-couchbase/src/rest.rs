//! Query Service REST adapter
//!
//! [`RestCluster`] implements [`QueryService`] against the `/query/service`
//! endpoint and [`Bucket`] by issuing key/value N1QL statements
//! (`USE KEYS`, `INSERT`, `UPSERT`, `DELETE`) through that same endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tessera_core::{Error, Result, Row};

use crate::client::{Bucket, JsonDocument, QueryService};
use crate::params::BoundParams;
use crate::query::{BACKEND, QueryOptions, QueryRequest, QueryResponse};

/// Connection settings for [`RestCluster`]
#[derive(Debug, Clone)]
pub struct RestClusterConfig {
	/// Query service base URL, e.g. `http://localhost:8093`
	pub base_url: String,
	pub username: String,
	pub password: Option<String>,
	pub bucket: String,
	/// HTTP timeout of a single request
	pub timeout: Option<Duration>,
}

impl RestClusterConfig {
	pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			username: String::new(),
			password: None,
			bucket: bucket.into(),
			timeout: None,
		}
	}

	pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.username = username.into();
		self.password = Some(password.into());
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}
}

/// Query service client bound to one bucket.
#[derive(Debug, Clone)]
pub struct RestCluster {
	client: reqwest::Client,
	config: RestClusterConfig,
	endpoint: String,
	keyspace: String,
}

impl RestCluster {
	pub fn new(config: RestClusterConfig) -> Result<Self> {
		if config.bucket.is_empty() {
			return Err(Error::Config("bucket name must not be empty".to_string()));
		}
		let mut builder = reqwest::Client::builder();
		if let Some(timeout) = config.timeout {
			builder = builder.timeout(timeout);
		}
		let client = builder
			.build()
			.map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: format!("{}/query/service", config.base_url.trim_end_matches('/')),
			keyspace: format!("`{}`", config.bucket.replace('`', "``")),
			config,
		})
	}

	async fn run(&self, statement: String, args: Vec<Value>) -> Result<Vec<Value>> {
		let request = QueryRequest {
			statement,
			params: BoundParams::Positional(args),
			options: QueryOptions::default(),
		};
		self.query(request).await?.into_rows()
	}
}

/// JSON body of a query service request.
fn request_body(request: &QueryRequest) -> Map<String, Value> {
	let mut body = Map::new();
	body.insert("statement".to_string(), Value::String(request.statement.clone()));

	match &request.params {
		BoundParams::None => {}
		BoundParams::Positional(args) => {
			body.insert("args".to_string(), Value::Array(args.clone()));
		}
		BoundParams::Named(named) => {
			for (name, value) in named {
				body.insert(format!("${}", name), value.clone());
			}
		}
	}

	let options = &request.options;
	if let Some(timeout) = options.timeout {
		body.insert("timeout".to_string(), json!(format!("{}ms", timeout.as_millis())));
	}
	if let Some(consistency) = options.scan_consistency {
		body.insert("scan_consistency".to_string(), json!(consistency.as_str()));
	}
	if !options.adhoc {
		body.insert("auto_prepare".to_string(), json!(true));
	}
	if options.read_only {
		body.insert("readonly".to_string(), json!(true));
	}
	if let Some(id) = &options.client_context_id {
		body.insert("client_context_id".to_string(), json!(id));
	}
	body
}

#[async_trait]
impl QueryService for RestCluster {
	async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
		let mut http = self.client.post(&self.endpoint).json(&request_body(&request));
		if !self.config.username.is_empty() {
			http = http.basic_auth(&self.config.username, self.config.password.as_ref());
		}

		let response = http.send().await.map_err(|e| Error::driver(BACKEND, e))?;
		let status = response.status();
		// statement failures arrive in the JSON envelope, also on non-2xx
		// responses
		response
			.json::<QueryResponse>()
			.await
			.map_err(|e| Error::driver(BACKEND, format!("HTTP {}: {}", status, e)))
	}
}

#[async_trait]
impl Bucket for RestCluster {
	fn name(&self) -> &str {
		&self.config.bucket
	}

	async fn get(&self, id: &str) -> Result<Option<JsonDocument>> {
		let statement = format!(
			"SELECT META(d).id AS id, META(d).cas AS cas, d AS content FROM {} AS d USE KEYS $1",
			self.keyspace
		);
		let rows = self.run(statement, vec![json!(id)]).await?;
		let Some(Value::Object(mut row)) = rows.into_iter().next() else {
			return Ok(None);
		};

		let content = match row.remove("content") {
			Some(Value::Object(content)) => content,
			Some(other) => {
				return Err(Error::Conversion(format!(
					"document {} is not a JSON object: {}",
					id, other
				)));
			}
			None => Row::new(),
		};
		let cas = row.get("cas").and_then(Value::as_u64).unwrap_or(0);
		Ok(Some(JsonDocument::new(id, content).with_cas(cas)))
	}

	async fn exists(&self, id: &str) -> Result<bool> {
		let statement = format!("SELECT RAW META(d).id FROM {} AS d USE KEYS $1", self.keyspace);
		Ok(!self.run(statement, vec![json!(id)]).await?.is_empty())
	}

	async fn insert(&self, document: JsonDocument) -> Result<JsonDocument> {
		let statement = format!(
			"INSERT INTO {} AS d (KEY, VALUE) VALUES ($1, $2) RETURNING META(d).cas AS cas",
			self.keyspace
		);
		store(self, statement, document).await
	}

	async fn upsert(&self, document: JsonDocument) -> Result<JsonDocument> {
		let statement = format!(
			"UPSERT INTO {} AS d (KEY, VALUE) VALUES ($1, $2) RETURNING META(d).cas AS cas",
			self.keyspace
		);
		store(self, statement, document).await
	}

	async fn replace(&self, document: JsonDocument) -> Result<JsonDocument> {
		if !self.exists(&document.id).await? {
			return Err(Error::driver(
				BACKEND,
				format!("document not found: {}", document.id),
			));
		}
		self.upsert(document).await
	}

	async fn remove(&self, id: &str) -> Result<bool> {
		let statement = format!(
			"DELETE FROM {} AS d USE KEYS $1 RETURNING RAW META(d).id",
			self.keyspace
		);
		Ok(!self.run(statement, vec![json!(id)]).await?.is_empty())
	}
}

async fn store(
	cluster: &RestCluster,
	statement: String,
	document: JsonDocument,
) -> Result<JsonDocument> {
	let args = vec![
		json!(document.id),
		Value::Object(document.content.clone()),
	];
	let rows = cluster.run(statement, args).await?;
	let cas = rows
		.first()
		.and_then(|row| row.get("cas"))
		.and_then(Value::as_u64)
		.unwrap_or(0);
	Ok(document.with_cas(cas))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::ScanConsistency;
	use rstest::rstest;

	#[rstest]
	fn test_request_body_positional() {
		let request = QueryRequest {
			statement: "SELECT * FROM b WHERE a = $1".to_string(),
			params: BoundParams::Positional(vec![json!(1)]),
			options: QueryOptions::new()
				.timeout(Duration::from_secs(2))
				.scan_consistency(ScanConsistency::RequestPlus)
				.adhoc(false),
		};
		let body = request_body(&request);
		assert_eq!(body["args"], json!([1]));
		assert_eq!(body["timeout"], json!("2000ms"));
		assert_eq!(body["scan_consistency"], json!("request_plus"));
		assert_eq!(body["auto_prepare"], json!(true));
		assert!(!body.contains_key("readonly"));
	}

	#[rstest]
	fn test_request_body_named() {
		let mut named = Map::new();
		named.insert("city".to_string(), json!("Nice"));
		let request = QueryRequest {
			statement: "SELECT * FROM b WHERE city = $city".to_string(),
			params: BoundParams::Named(named),
			options: QueryOptions::new().read_only(true),
		};
		let body = request_body(&request);
		assert_eq!(body["$city"], json!("Nice"));
		assert_eq!(body["readonly"], json!(true));
	}

	#[rstest]
	fn test_keyspace_is_escaped() {
		let cluster =
			RestCluster::new(RestClusterConfig::new("http://localhost:8093/", "odd`name")).unwrap();
		assert_eq!(cluster.keyspace, "`odd``name`");
		assert_eq!(cluster.endpoint, "http://localhost:8093/query/service");
	}
}

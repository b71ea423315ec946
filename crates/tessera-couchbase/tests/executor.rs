//! Executor behaviour against an in-memory bucket and query service.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use parking_lot::Mutex;
use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tessera_core::{
	Dispatcher, Entity, EntityRegistry, Error, ExecutorSettings, NamingPolicy, PoolSettings, Result,
	Row,
};
use tessera_couchbase::{
	BoundParams, Bucket, CouchbaseExecutor, JsonDocument, QueryError, QueryParams, QueryRequest,
	QueryResponse, QueryService, QueryStatus,
};

#[derive(Default)]
struct MemoryCluster {
	documents: Mutex<BTreeMap<String, Row>>,
	responses: Mutex<VecDeque<QueryResponse>>,
	requests: Mutex<Vec<QueryRequest>>,
}

impl MemoryCluster {
	fn respond(&self, rows: Vec<Value>) {
		self.responses.lock().push_back(QueryResponse::success(rows));
	}

	fn requests(&self) -> Vec<QueryRequest> {
		self.requests.lock().clone()
	}
}

#[async_trait]
impl QueryService for MemoryCluster {
	async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
		self.requests.lock().push(request);
		Ok(self.responses.lock().pop_front().unwrap_or_default())
	}
}

#[async_trait]
impl Bucket for MemoryCluster {
	fn name(&self) -> &str {
		"travel-sample"
	}

	async fn get(&self, id: &str) -> Result<Option<JsonDocument>> {
		Ok(self
			.documents
			.lock()
			.get(id)
			.map(|content| JsonDocument::new(id, content.clone())))
	}

	async fn exists(&self, id: &str) -> Result<bool> {
		Ok(self.documents.lock().contains_key(id))
	}

	async fn insert(&self, document: JsonDocument) -> Result<JsonDocument> {
		let mut documents = self.documents.lock();
		if documents.contains_key(&document.id) {
			return Err(Error::driver("couchbase", format!("document exists: {}", document.id)));
		}
		documents.insert(document.id.clone(), document.content.clone());
		Ok(document.with_cas(1))
	}

	async fn upsert(&self, document: JsonDocument) -> Result<JsonDocument> {
		self.documents
			.lock()
			.insert(document.id.clone(), document.content.clone());
		Ok(document.with_cas(2))
	}

	async fn replace(&self, document: JsonDocument) -> Result<JsonDocument> {
		let mut documents = self.documents.lock();
		if !documents.contains_key(&document.id) {
			return Err(Error::driver("couchbase", format!("document not found: {}", document.id)));
		}
		documents.insert(document.id.clone(), document.content.clone());
		Ok(document.with_cas(3))
	}

	async fn remove(&self, id: &str) -> Result<bool> {
		Ok(self.documents.lock().remove(id).is_some())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Airline {
	id: String,
	call_sign: String,
	country: String,
	fleet_size: u32,
}

impl Entity for Airline {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Route {
	id: i64,
	source_airport: String,
}

impl Entity for Route {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Landmark {
	title: String,
}

impl Entity for Landmark {}

#[fixture]
fn cluster() -> Arc<MemoryCluster> {
	Arc::new(MemoryCluster::default())
}

fn executor(cluster: &Arc<MemoryCluster>, policy: NamingPolicy) -> CouchbaseExecutor {
	CouchbaseExecutor::builder(cluster.clone(), cluster.clone())
		.naming_policy(policy)
		.build()
		.unwrap()
}

fn airline() -> Airline {
	Airline {
		id: "airline_10".to_string(),
		call_sign: "MILE-AIR".to_string(),
		country: "United States".to_string(),
		fleet_size: 12,
	}
}

#[rstest]
#[tokio::test]
async fn test_entity_roundtrip_through_bucket(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::LowerCamelCase);

	let stored = executor.upsert(&airline()).await.unwrap();
	assert_eq!(stored.id, "airline_10");

	let content = cluster.documents.lock()["airline_10"].clone();
	assert_eq!(content["callSign"], json!("MILE-AIR"));
	assert_eq!(content["fleetSize"], json!(12));
	assert!(!content.contains_key("id"));

	let loaded: Airline = executor.get("airline_10").await.unwrap().unwrap();
	assert_eq!(loaded, airline());
	assert!(executor.get::<Airline>("airline_11").await.unwrap().is_none());
	assert!(executor.exists("airline_10").await.unwrap());
}

#[rstest]
#[tokio::test]
async fn test_integer_ids_use_their_text_as_key(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::SnakeCase);
	let route = Route {
		id: 10000,
		source_airport: "TLV".to_string(),
	};
	executor.insert(&route).await.unwrap();
	assert!(cluster.documents.lock().contains_key("10000"));

	let loaded: Route = executor.get("10000").await.unwrap().unwrap();
	assert_eq!(loaded, route);
}

#[rstest]
#[tokio::test]
async fn test_missing_id_fails_before_the_driver(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::Preserve);

	let err = executor
		.insert(&Landmark {
			title: "Eiffel Tower".to_string(),
		})
		.await
		.unwrap_err();
	assert!(matches!(err, Error::MissingId { .. }));

	let mut map = serde_json::Map::new();
	map.insert("title".to_string(), json!("Louvre"));
	let err = executor.upsert(&map).await.unwrap_err();
	assert!(matches!(err, Error::MissingId { .. }));

	assert!(cluster.documents.lock().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_map_entities_keep_their_keys(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::SnakeCase);
	let mut map = serde_json::Map::new();
	map.insert("id".to_string(), json!("hotel_1"));
	map.insert("freeParking".to_string(), json!(true));

	executor.upsert(&map).await.unwrap();
	let loaded: serde_json::Map<String, Value> = executor.get("hotel_1").await.unwrap().unwrap();
	assert_eq!(loaded, map);
}

#[rstest]
#[tokio::test]
async fn test_bulk_writes_and_removal(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::Preserve);
	let mut second = airline();
	second.id = "airline_11".to_string();

	executor.insert_all(&[airline(), second.clone()]).await.unwrap();
	let err = executor.insert(&second).await.unwrap_err();
	assert!(matches!(err, Error::Driver { .. }));

	let loaded: Vec<Airline> = executor
		.gets(&["airline_11", "missing", "airline_10"])
		.await
		.unwrap();
	assert_eq!(loaded, vec![second.clone(), airline()]);

	second.fleet_size = 20;
	executor.replace(&second).await.unwrap();
	assert_eq!(
		executor.get::<Airline>("airline_11").await.unwrap().unwrap().fleet_size,
		20
	);

	assert!(executor.remove_entity(&second).await.unwrap());
	assert_eq!(executor.remove_all(&["airline_10", "airline_11"]).await.unwrap(), 1);
	assert!(cluster.documents.lock().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_query_maps_rows_and_binds_params(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::LowerCamelCase);
	cluster.respond(vec![json!({
		"id": "airline_10",
		"callSign": "MILE-AIR",
		"country": "United States",
		"fleetSize": 12
	})]);

	let airlines: Vec<Airline> = executor
		.query(
			"SELECT META(a).id AS id, a.* FROM `travel-sample` a WHERE a.country = $country",
			QueryParams::named([("country", "United States")]).unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(airlines, vec![airline()]);

	let requests = cluster.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(
		requests[0].params,
		BoundParams::Named(json!({"country": "United States"}).as_object().unwrap().clone())
	);
}

#[rstest]
#[tokio::test]
async fn test_entity_params_use_the_shared_registry(cluster: Arc<MemoryCluster>) {
	// Arrange
	let registry = Arc::new(EntityRegistry::new());
	let executor = CouchbaseExecutor::builder(cluster.clone(), cluster.clone())
		.naming_policy(NamingPolicy::LowerCamelCase)
		.registry(registry.clone())
		.build()
		.unwrap();
	let meta = registry.meta::<Airline>(NamingPolicy::LowerCamelCase).unwrap();
	cluster.respond(vec![]);

	// Act
	let params = executor.params_of(&airline()).unwrap();
	executor
		.execute(
			"UPDATE `travel-sample` SET callSign = $callSign WHERE META().id = $id",
			params,
		)
		.await
		.unwrap();

	// Assert
	assert_eq!(registry.len(), 1);
	assert!(Arc::ptr_eq(
		&meta,
		&registry.meta::<Airline>(NamingPolicy::LowerCamelCase).unwrap()
	));
	assert_eq!(
		cluster.requests()[0].params,
		BoundParams::Named(
			json!({"callSign": "MILE-AIR", "id": "airline_10"})
				.as_object()
				.unwrap()
				.clone()
		)
	);
}

#[rstest]
#[tokio::test]
async fn test_invalid_binding_sends_nothing(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::Preserve);
	let err = executor
		.execute("SELECT * FROM `travel-sample` WHERE id = $1", ())
		.await
		.unwrap_err();
	assert!(err.is_argument_error());
	assert!(cluster.requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_scalar_extraction(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::Preserve);

	cluster.respond(vec![json!({"name": "40-Mile Air"})]);
	let name: Option<String> = executor.query_for_single("SELECT name FROM b", ()).await.unwrap();
	assert_eq!(name.as_deref(), Some("40-Mile Air"));

	cluster.respond(vec![json!({"id": "airline_10", "name": "40-Mile Air"})]);
	let name: Option<String> = executor
		.query_for_single("SELECT id, name FROM b", ())
		.await
		.unwrap();
	assert_eq!(name.as_deref(), Some("40-Mile Air"));

	cluster.respond(vec![json!({"id": "airline_10", "name": "40-Mile Air", "iata": "Q5"})]);
	let err = executor
		.query_for_single::<String>("SELECT id, name, iata FROM b", ())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Conversion(_)));

	cluster.respond(vec![json!(42)]);
	let count: Option<i64> = executor
		.query_for_single("SELECT RAW COUNT(*) FROM b", ())
		.await
		.unwrap();
	assert_eq!(count, Some(42));

	cluster.respond(vec![]);
	let none: Option<i64> = executor.query_for_single("SELECT RAW 1", ()).await.unwrap();
	assert_eq!(none, None);
}

#[rstest]
#[tokio::test]
async fn test_query_for_unique_rejects_many_rows(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::Preserve);
	cluster.respond(vec![json!({"name": "a"}), json!({"name": "b"})]);
	let err = executor
		.query_for_unique::<String>("SELECT name FROM b", ())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Conversion(_)));
}

#[rstest]
#[tokio::test]
async fn test_error_envelope_is_a_driver_error(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::Preserve);
	cluster.responses.lock().push_back(QueryResponse {
		status: QueryStatus::Errors,
		errors: vec![QueryError {
			code: 12003,
			message: "Keyspace not found".to_string(),
		}],
		..QueryResponse::default()
	});

	let err = executor.query::<Airline>("SELECT * FROM nowhere", ()).await.unwrap_err();
	match err {
		Error::Driver { backend, message } => {
			assert_eq!(backend, "couchbase");
			assert!(message.contains("Keyspace not found"));
		}
		other => panic!("unexpected error: {other}"),
	}
}

#[rstest]
#[tokio::test]
async fn test_find_first_and_stream(cluster: Arc<MemoryCluster>) {
	let executor = executor(&cluster, NamingPolicy::SnakeCase);
	let rows = vec![
		json!({"id": 1, "source_airport": "TLV"}),
		json!({"id": 2, "source_airport": "MRS"}),
	];

	cluster.respond(rows.clone());
	let first: Option<Route> = executor.find_first("SELECT r.* FROM b r", ()).await.unwrap();
	assert_eq!(first.unwrap().id, 1);

	cluster.respond(rows);
	let routes: Vec<Route> = executor
		.stream("SELECT r.* FROM b r", ())
		.await
		.unwrap()
		.try_collect()
		.await
		.unwrap();
	assert_eq!(routes.len(), 2);
	assert_eq!(routes[1].source_airport, "MRS");
}

#[rstest]
#[tokio::test]
async fn test_statement_cache_hits_and_threshold(cluster: Arc<MemoryCluster>) {
	let mut settings = ExecutorSettings::default();
	settings.statement_cache.max_query_length = 40;
	let executor = CouchbaseExecutor::builder(cluster.clone(), cluster.clone())
		.settings(settings)
		.build()
		.unwrap();

	let short = "SELECT RAW 1";
	let long = "SELECT RAW name FROM `travel-sample` WHERE type = 'airline'";
	for _ in 0..3 {
		executor.execute(short, ()).await.unwrap();
		executor.execute(long, ()).await.unwrap();
	}

	let stats = executor.statement_cache_stats();
	assert_eq!(stats.misses, 1);
	assert_eq!(stats.hits, 2);
	assert_eq!(stats.uncached, 3);
	assert_eq!(stats.entries, 1);
}

#[rstest]
fn test_blocking_and_submitted_forms_agree() {
	let cluster = Arc::new(MemoryCluster::default());
	let executor = executor(&cluster, NamingPolicy::LowerCamelCase);
	let dispatcher = Dispatcher::new(&PoolSettings {
		max_concurrency: Some(2),
		worker_threads: Some(1),
	})
	.unwrap();

	dispatcher.block_on(executor.upsert(&airline())).unwrap();
	let blocking: Option<Airline> = dispatcher.block_on(executor.get("airline_10")).unwrap();

	let background = executor.clone();
	let handle = dispatcher.submit(async move { background.get::<Airline>("airline_10").await });
	let submitted = handle.wait().unwrap();

	assert_eq!(blocking, submitted);
	assert_eq!(blocking, Some(airline()));
}

//! Facade re-exports and shared entity metadata.

use std::sync::Arc;

use rstest::rstest;
use serde::{Deserialize, Serialize};
use tessera::prelude::*;

#[derive(Debug, Serialize, Deserialize)]
struct Account {
	id: String,
	display_name: String,
}

impl Entity for Account {}

#[cfg(feature = "neo4j")]
struct Offline;

#[cfg(feature = "neo4j")]
#[async_trait::async_trait]
impl tessera::neo4j::SessionFactory for Offline {
	async fn open(&self) -> Result<Box<dyn tessera::neo4j::GraphSession>> {
		Err(Error::driver(tessera::neo4j::BACKEND, "offline"))
	}
}

#[rstest]
fn test_settings_drive_naming() {
	let settings = ExecutorSettings::from_toml_str(r#"naming_policy = "SCREAMING_SNAKE_CASE""#).unwrap();
	let registry = EntityRegistry::new();

	let meta = registry.meta::<Account>(settings.naming_policy).unwrap();

	assert_eq!(meta.column_of("display_name"), "DISPLAY_NAME");
	assert_eq!(meta.id_property(), Some("id"));
}

#[cfg(feature = "neo4j")]
#[rstest]
#[tokio::test]
async fn test_executors_share_a_registry() {
	let registry = Arc::new(EntityRegistry::new());
	let executor = Neo4jExecutor::builder(Arc::new(Offline))
		.registry(registry.clone())
		.build()
		.unwrap();

	let first = executor.to_node(&Account {
		id: "a1".to_string(),
		display_name: "Ada".to_string(),
	});
	assert!(first.is_ok());
	assert_eq!(registry.len(), 1);

	let err = executor.count::<Account>().await.unwrap_err();
	assert!(matches!(err, Error::Driver { backend: "neo4j", .. }));
	assert!(!err.is_argument_error());
}

//! Native session seam
//!
//! The executor runs Cypher through [`GraphSession`]s opened by a
//! [`SessionFactory`]. Result rows are JSON objects keyed by the `RETURN`
//! aliases; node values are expected as property maps.

use async_trait::async_trait;
use tessera_core::{Result, Row};

/// Backend name used in driver errors
pub const BACKEND: &str = "neo4j";

/// An open session able to run Cypher statements.
#[async_trait]
pub trait GraphSession: Send + Sync {
	/// Run `cypher` with named `params` and collect every result row.
	async fn run(&self, cypher: &str, params: Row) -> Result<Vec<Row>>;
}

/// Opens new sessions on demand.
#[async_trait]
pub trait SessionFactory: Send + Sync {
	async fn open(&self) -> Result<Box<dyn GraphSession>>;
}

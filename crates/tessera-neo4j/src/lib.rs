//! # Tessera Neo4j
//!
//! Entity executor over graph sessions.
//!
//! ## Features
//!
//! - **Nodes**: one node per entity, labelled with the entity name and keyed
//!   by its identifier property; properties must be scalars or lists of
//!   scalars
//! - **Session queue**: a bounded hand-off queue reusing idle sessions
//!   ([`SessionQueue`])
//! - **Queries**: raw Cypher decoded into entities, maps or scalars
//! - `driver`: [`BoltSessionFactory`] over `neo4rs`
//!
//! ## Example
//!
//! ```rust,ignore
//! let executor = Neo4jExecutor::new(Arc::new(factory))?;
//! executor.save(&person).await?;
//! let loaded: Option<Person> = executor.load("p1").await?;
//! let names: Vec<String> = executor
//!     .query("MATCH (p:Person) RETURN p.name AS name", Row::new())
//!     .await?;
//! ```

pub mod cypher;
#[cfg(feature = "driver")]
pub mod driver;
pub mod executor;
pub mod mapping;
pub mod queue;
pub mod session;

#[cfg(feature = "driver")]
pub use driver::{BoltConfig, BoltSessionFactory};
pub use executor::{Neo4jExecutor, Neo4jExecutorBuilder};
pub use mapping::{NodeProperties, params_of};
pub use queue::{DEFAULT_IDLE_SESSIONS, SessionGuard, SessionQueue};
pub use session::{BACKEND, GraphSession, SessionFactory};

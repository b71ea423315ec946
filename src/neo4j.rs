//! Graph executor over Neo4j sessions.

pub use tessera_neo4j::*;

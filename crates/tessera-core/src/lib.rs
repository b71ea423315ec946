//! # Tessera Core
//!
//! Building blocks shared by the Tessera executors:
//!
//! - **Entities**: the [`Entity`] trait and per-type [`EntityMeta`], memoized
//!   per naming policy in an [`EntityRegistry`]
//! - **Naming policies**: property-to-column translation ([`NamingPolicy`])
//! - **Mapping**: entity <-> JSON [`Record`] conversion and scalar extraction
//! - **Dispatch**: blocking and task-handle forms of any executor operation
//!   ([`Dispatcher`], [`TaskHandle`])
//! - **Statement cache**: LRU pool of parsed statements ([`StatementCache`])
//! - **Settings**: TOML/env configuration ([`ExecutorSettings`])
//!
//! ## Quick Start
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tessera_core::{Entity, EntityRegistry, NamingPolicy, mapper};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     first_name: String,
//! }
//!
//! impl Entity for User {}
//!
//! let registry = EntityRegistry::new();
//! let meta = registry.meta::<User>(NamingPolicy::LowerCamelCase).unwrap();
//!
//! let user = User { id: "u1".into(), first_name: "Ada".into() };
//! let record = mapper::to_record(&user, &meta).unwrap();
//! assert!(record.fields.contains_key("firstName"));
//!
//! let back: User = mapper::from_record(record, &meta).unwrap();
//! assert_eq!(back, user);
//! ```

pub mod dispatch;
pub mod entity;
pub mod error;
pub mod introspect;
pub mod mapper;
pub mod naming;
pub mod registry;
pub mod settings;
pub mod statement;

pub use dispatch::{Dispatcher, TaskHandle};
pub use entity::{DEFAULT_ID_PROPERTY, Entity};
pub use error::{Error, Result};
pub use introspect::EntityShape;
pub use mapper::{Record, Row};
pub use naming::NamingPolicy;
pub use registry::{EntityKind, EntityMeta, EntityRegistry, PropertyMeta};
pub use settings::{ExecutorSettings, PoolSettings, StatementCacheSettings};
pub use statement::{StatementCache, StatementCacheStats};

/// Prelude module for convenient imports
pub mod prelude {
	pub use crate::dispatch::{Dispatcher, TaskHandle};
	pub use crate::entity::Entity;
	pub use crate::error::{Error, Result};
	pub use crate::naming::NamingPolicy;
	pub use crate::registry::EntityRegistry;
	pub use crate::settings::ExecutorSettings;
}

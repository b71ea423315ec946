//! # Tessera MongoDB
//!
//! Entity executor over MongoDB collections.
//!
//! ## Features
//!
//! - **Mapping**: identifier as `_id` (24-digit hex strings stored as
//!   `ObjectId`), remaining properties as top-level fields named by the
//!   naming policy
//! - **Collections**: [`MongoExecutor::collection`] binds a
//!   [`CollectionExecutor`] offering reads, writes, projections and
//!   aggregation
//! - `driver`: [`MongoBackend`] over the official driver
//!
//! ## Example
//!
//! ```rust,ignore
//! use bson::doc;
//!
//! let books = executor.collection("books");
//! books.insert(&book).await?;
//! let found: Option<Book> = books.get("5f0c1e2d3b4a596877665544").await?;
//! let titles: Option<String> = books.query_for_single(doc! { "author": "Le Guin" }, "title").await?;
//! ```

#[cfg(feature = "driver")]
pub mod driver;
pub mod executor;
pub mod mapping;
pub mod store;

#[cfg(feature = "driver")]
pub use driver::{MongoBackend, MongoBackendBuilder};
pub use executor::{CollectionExecutor, MongoExecutor, MongoExecutorBuilder};
pub use mapping::ID_FIELD;
pub use store::{BACKEND, DocumentStore, FindOptions, UpdateResult};

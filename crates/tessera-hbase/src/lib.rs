//! # Tessera HBase
//!
//! Entity executor over HBase tables.
//!
//! ## Features
//!
//! - **Byte model**: [`Get`], [`Put`], [`Delete`], [`Append`], [`Increment`],
//!   [`Scan`] and their typed builders ([`AnyGet`], [`AnyPut`], ...)
//! - **Mapping**: identifier as row key, nested structs and maps as column
//!   families, scalars as cells of the entity's default family
//! - **Versions**: [`HBaseColumn`] and [`Versions`] properties carry cell
//!   timestamps
//! - `rest`: [`RestTableProvider`] over the HBase REST gateway
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_hbase::{HBaseExecutor, RestTableConfig, RestTableProvider};
//!
//! let provider = Arc::new(RestTableProvider::new(RestTableConfig::new("http://localhost:8080"))?);
//! let executor = HBaseExecutor::new(provider)?;
//!
//! executor.put(&user).await?;
//! let loaded: Option<User> = executor.get("user#1").await?;
//! let team: Vec<User> = executor.scan_prefix::<User>("user#").await?;
//! ```

pub mod any;
pub mod codec;
pub mod column;
pub mod executor;
pub mod layout;
pub mod mapping;
pub mod model;
#[cfg(feature = "rest")]
pub mod rest;
pub mod table;

pub use any::{AnyAppend, AnyDelete, AnyGet, AnyIncrement, AnyPut, AnyScan};
pub use codec::{CellCodec, CellKey};
pub use column::{HBaseColumn, Versions};
pub use executor::{HBaseExecutor, HBaseExecutorBuilder};
pub use layout::{CellKind, EntityLayout, PropertyLayout};
pub use mapping::{ColumnMapping, ROW_MARKER};
pub use model::{
	ALL_VERSIONS, Append, Cell, ColumnSelector, Delete, Get, Increment, Put, PutColumn, RowResult,
	Scan, TimeRange,
};
#[cfg(feature = "rest")]
pub use rest::{RestTable, RestTableConfig, RestTableProvider};
pub use table::{BACKEND, Table, TableProvider};

//! Entity metadata, naming policies, mapping and dispatch.
//!
//! # Examples
//!
//! ```rust
//! use tessera::core::NamingPolicy;
//!
//! assert_eq!(NamingPolicy::SnakeCase.translate("firstName"), "first_name");
//! ```

pub use tessera_core::*;

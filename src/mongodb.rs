//! Document executor over MongoDB collections.

pub use tessera_mongodb::*;

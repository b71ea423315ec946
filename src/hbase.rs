//! Column-family executor over HBase tables.

pub use tessera_hbase::*;

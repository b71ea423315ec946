//! N1QL executor over Couchbase buckets.

pub use tessera_couchbase::*;

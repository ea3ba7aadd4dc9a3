//! Analysis modules.
//!
//! Aggregation of per-host cache statistics into cluster-wide script records.

pub mod aggregator;

pub use aggregator::*;

//! opcache-scripts - cluster-wide OPcache script statistics.
//!
//! Merges per-host OPcache script listings, collected across the groups of a
//! cluster, into one record per script path and renders them for operators.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod models;
pub mod report;
pub mod source;

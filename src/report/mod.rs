//! Report generation module.
//!
//! This module renders aggregated script statuses for operators.

pub mod format;
pub mod generator;

pub use format::*;
pub use generator::*;

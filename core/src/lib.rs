//! Geo insights core: the filter-combination aggregation pipeline.
//!
//! Standalone library with no dependency on any interactive front end.
//! The exporter binary and any interactive consumer share this interface.

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod geo;
pub mod pipeline;
pub mod registry;
pub mod rng;
pub mod section;
pub mod snapshot;
pub mod store;
pub mod synthetic;
pub mod types;

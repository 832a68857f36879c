//! Integration test suite for metricmat
//!
//! End-to-end tests over the public library API and the `metricmat` binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **materialize**: Full passes through [`metricmat::materialize::Orchestrator`]
//! - **cache_behavior**: Persistent cache reuse, invalidation and eviction
//! - **cli**: The binary, with `cat` standing in for the semantic layer

#[path = "../common/mod.rs"]
mod common;

mod cache_behavior;
mod cli;
mod materialize;

//! metricmat - metric query materialization for model pipelines
//!
//! Model code in a transformation pipeline can embed semantic-layer queries as
//! template directives:
//!
//! ```sql
//! select * from {{ dbt_metric_utils_materialize(metrics=['revenue'], group_by=['region']) }}
//! ```
//!
//! Before the pipeline runs, metricmat finds every such directive, renders
//! each distinct query once through the semantic layer, and hands the results
//! back as build variables keyed by the query's canonical signature. It also
//! adds the queried metrics to each consuming model's dependencies so the
//! pipeline schedules models after the metrics they read.
//!
//! # Architecture Overview
//!
//! A pass runs these stages, each in its own module:
//!
//! 1. [`extract`] - find `name(...)` invocations in raw model text
//! 2. [`parser`] - parse the call into keyword → literal arguments
//! 3. [`query`] - validate arguments into a [`query::MetricQuery`] and its signature
//! 4. [`closure`] - collect the transitive upstream entities of the queried metrics
//! 5. [`hashing`] - digest the closure's semantic snapshots
//! 6. [`cache`] - look up `(signature, digest)` in memory, then on disk
//! 7. [`render`] - render misses through the external semantic layer
//! 8. [`patch`] - add consumer → metric edges to the [`graph`]
//!
//! [`materialize`] drives the stages; [`vars`] turns the results into the
//! YAML variable block.
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - Project configuration (`metricmat.toml`)
//! - [`core`] - Error taxonomy and user-facing error reporting
//! - [`constants`] - Shared defaults
//! - [`utils`] - File and path helpers
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Materialize and write the patched manifest back
//! metricmat materialize --manifest target/manifest.json --write-manifest > vars.yml
//!
//! # List invocations under a directory
//! metricmat extract models/
//!
//! # Cache maintenance
//! metricmat cache info
//! metricmat cache clean
//! ```

// Pass stages
pub mod cache;
pub mod closure;
pub mod extract;
pub mod graph;
pub mod hashing;
pub mod materialize;
pub mod parser;
pub mod patch;
pub mod query;
pub mod render;
pub mod vars;

// Application layer
pub mod cli;
pub mod config;

// Supporting modules
pub mod constants;
pub mod core;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

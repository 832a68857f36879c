//! Test utilities for metricmat
//!
//! Manifest fixtures, a counting renderer and one-time logging setup shared
//! by unit tests (and by integration tests built with the `test-utils`
//! feature).
//!
//! # Example
//!
//! ```rust,ignore
//! use metricmat::materialize::Orchestrator;
//! use metricmat::test_utils::{CountingRenderer, ManifestFixture};
//!
//! let mut graph = ManifestFixture::shop()
//!     .with_model("model.shop.report", "{{ dbt_metric_utils_materialize(metrics=['revenue']) }}")
//!     .graph();
//! let mut orchestrator = Orchestrator::new(CountingRenderer::default());
//! orchestrator.run(&mut graph).unwrap();
//! assert_eq!(orchestrator.renderer().calls(), 1);
//! ```

pub mod fixtures;

pub use fixtures::{CountingRenderer, ManifestFixture};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

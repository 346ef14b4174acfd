//! Shared helpers for the bakedag integration tests: temp-dir sandboxes,
//! config and task builders, and a scripted [`FakeBackend`] that stands in
//! for real task execution.

pub mod builders;
pub mod fake_executor;

use std::sync::Once;
use std::time::Duration;

use bakedag::logging::LOG_ENV;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{bare_task, task, ConfigBuilder, Sandbox};
pub use fake_executor::FakeBackend;

/// Upper bound for a single build in tests; a hung scheduler fails instead
/// of blocking the suite.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Reads the same `BAKEDAG_LOG` variable as the binary, e.g.
/// `BAKEDAG_LOG=bakedag::dag=debug cargo test -- --nocapture`. Output is
/// only shown for failing tests unless `--nocapture` is given.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("build did not finish within {TEST_TIMEOUT:?}"))
}

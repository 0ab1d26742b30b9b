//! Tracing setup shared by binaries and tests that embed the kernel

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to the kernel
/// crates and `warn` to everything else. Returns false when a subscriber was
/// already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "actor_kernel={level},kernel_config={level},warn",
            level = default_level
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// Same as [`init_tracing`] but writes through the test harness capture
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actor_kernel=debug")),
        )
        .try_init();
}

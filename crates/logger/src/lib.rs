use tracing_subscriber::EnvFilter;

/// Default filter for both binaries when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "ledger_normalizer=info,backend_api=info,tower_http=debug";

/// Installs the global fmt subscriber, writing to stderr so stdout stays
/// free for command output.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless, the
/// second subscriber is simply not installed.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(default_filter, "tracing initialized");
    }
}

/// Logging Module
///
/// Subscriber setup for the binary, plus a capture helper so tests can assert
/// on emitted log lines.
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honouring `RUST_LOG`
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

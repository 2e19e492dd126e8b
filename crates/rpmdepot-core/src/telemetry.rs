use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for an embedding process.
///
/// Honors `RUST_LOG`; defaults to debug output for the rpmdepot crates.
/// Call once at startup.
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "rpmdepot=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

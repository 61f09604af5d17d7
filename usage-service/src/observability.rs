use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout is reserved for command output such as reports.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("usage_service=info".parse().unwrap_or_else(|_| "info".parse().unwrap()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

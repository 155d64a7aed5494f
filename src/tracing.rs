use tracing_subscriber::{fmt, EnvFilter};

/// Installs the process-wide subscriber for the loader.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Output goes to stderr so the
/// exit diagnostic and the progress lines share one stream.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Console tracing on stderr; stdout is left to the summary.
///
/// `level` wins over `RUST_LOG`; with neither set the filter is `info`.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let env_filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }
    Ok(())
}

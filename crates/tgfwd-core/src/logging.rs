use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the forwarder.
///
/// Output goes to stderr so the interactive menu on stdout stays readable.
pub fn init(service_name: &str, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    // Default: `level` for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{service_name}={level},tgfwd_core={level},tgfwd_telegram={level}"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}

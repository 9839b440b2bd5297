use tracing_subscriber::EnvFilter;

/// Install the JSON log formatter on stderr.
///
/// `quiet` turns every level off. Otherwise `RUST_LOG` is honoured and the
/// default level is `info`. Calling this more than once is a no-op.
pub fn init_logging(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging with environment filter.
/// Set RCUDA_LOG=debug (or trace, info, warn, error) for verbosity control.
///
/// Safe to call more than once; the shim invokes this from whichever
/// intercepted entry point the host happens to hit first.
pub fn try_init_logging(default: &str) {
    let filter = EnvFilter::try_from_env("RCUDA_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default.to_string()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "haul_scanner=info";
const VERBOSE_DIRECTIVE: &str = "haul_scanner=debug";

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// Logs go to stderr so stdout carries only results.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_DIRECTIVE
    } else {
        DEFAULT_DIRECTIVE
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

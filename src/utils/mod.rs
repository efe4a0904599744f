pub mod build_info;
pub mod paths;

use std::{fs, path::Path, sync::Once};

use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

const DEFAULT_DIRECTIVE: &str = "spend_forecast=info";

/// Initializes the global tracing subscriber with sensible defaults.
///
/// Logs go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` replaces the `spend_forecast=info` default when it is set and
/// parses.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::fmt;

        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let _ = fmt()
            .with_env_filter(log_filter(rust_log.as_deref()))
            .with_writer(std::io::stderr)
            .try_init();
    });
}

fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Creates `path` and any missing parents.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

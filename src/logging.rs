//! `tracing-subscriber` setup shared by the binaries.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// Third-party targets that are chatty at `info`.
const QUIET_TARGETS: [(&str, &str); 5] = [
    ("actix_server", "warn"),
    ("aws_config", "warn"),
    ("aws_smithy_runtime", "warn"),
    ("hyper", "warn"),
    ("h2", "warn"),
];

fn build_env_filter(default_level: &str) -> EnvFilter {
    // RUST_LOG wins when set and valid.
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = std::iter::once(default_level.to_string())
        .chain(QUIET_TARGETS.iter().map(|(target, lvl)| format!("{target}={lvl}")))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` (falling back to `default_level`).
///
/// Calling it twice is harmless; the second call keeps the first subscriber.
pub fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(default_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
}

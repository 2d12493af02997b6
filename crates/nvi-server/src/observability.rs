//! Log output of the server process.
//!
//! `RUST_LOG` replaces the configured filter entirely. Otherwise the
//! configured level applies to every target, except that database driver and
//! HTTP connection chatter never goes below `warn`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, LoggingConfig};

/// Targets that log per-query or per-connection detail.
const CHATTY_TARGETS: [&str; 3] = ["sqlx", "hyper", "h2"];

/// Builds the filter directives for a configured level.
///
/// ```
/// use nvi_server::observability::filter_directives;
///
/// assert_eq!(filter_directives("debug"), "debug,sqlx=warn,hyper=warn,h2=warn");
/// assert_eq!(filter_directives("off"), "off");
/// ```
#[must_use]
pub fn filter_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    let chatty = match level.as_str() {
        "off" => return level,
        "trace" | "debug" | "info" => "warn",
        other => other,
    };

    let mut directives = vec![level.clone()];
    directives.extend(CHATTY_TARGETS.iter().map(|target| format!("{target}={chatty}")));
    directives.join(",")
}

fn build_filter(level: &str) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        eprintln!("Warning: ignoring unparsable RUST_LOG");
    }
    EnvFilter::try_new(filter_directives(level)).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_tracing(cfg: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(build_filter(&cfg.level));
    let installed = match cfg.format {
        LogFormat::Full => registry.with(fmt::layer()).try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(level = %cfg.level, format = ?cfg.format, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chatty_targets_capped_at_warn() {
        assert_eq!(
            filter_directives("trace"),
            "trace,sqlx=warn,hyper=warn,h2=warn"
        );
        assert_eq!(filter_directives("INFO"), "info,sqlx=warn,hyper=warn,h2=warn");
    }

    #[test]
    fn test_quieter_levels_apply_everywhere() {
        assert_eq!(
            filter_directives("error"),
            "error,sqlx=error,hyper=error,h2=error"
        );
        assert_eq!(filter_directives(" off "), "off");
    }

    #[test]
    fn test_directives_parse() {
        for level in ["trace", "debug", "info", "warn", "error", "off"] {
            assert!(EnvFilter::try_new(filter_directives(level)).is_ok(), "{level}");
        }
    }
}

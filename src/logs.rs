//! Tracing subscriber setup.
//!
//! Logs go to stderr so they never interleave with the conversation on
//! stdout.  `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Build the filter: `RUST_LOG` when set and valid, else `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Install the global subscriber.  Calling it twice is harmless; the
/// second call leaves the first subscriber in place.
pub fn init(level: LogLevel) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init(LogLevel::Warn);
        init(LogLevel::Debug);
        tracing::info!("still alive");
    }
}

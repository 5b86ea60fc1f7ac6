//! Logging setup utilities for the group-buy chat packages.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The filter enables both the chat library crate and the binary at the given
/// level. It can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "groupbuy-chat")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use groupbuy_shared::logger::setup_logger;
///
/// setup_logger("groupbuy-chat", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Logger initialized for '{}'", binary_name);
}

/// Build the default filter directive used when `RUST_LOG` is not set.
fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    format!(
        "groupbuy_chat={level},groupbuy_shared={level},{bin}={level}",
        level = default_log_level,
        bin = binary_name.replace('-', "_"),
    )
}

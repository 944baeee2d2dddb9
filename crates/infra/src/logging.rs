//! Tracing subscriber setup
//!
//! Installs a process-wide `tracing-subscriber` fmt layer. `RUST_LOG` wins
//! when set; otherwise the level follows the client's `debug` toggle.

use std::sync::Once;

use redkite_domain::ClientConfig;
use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Level used when `RUST_LOG` is unset
pub fn default_directive(config: &ClientConfig) -> &'static str {
    if config.debug {
        "debug"
    } else {
        "info"
    }
}

/// Install a text subscriber once per process
pub fn init_tracing(config: &ClientConfig) {
    init_tracing_with(config, LogFormat::Text);
}

/// Install a subscriber in `format` once per process
///
/// Later calls, and calls made after another subscriber was installed, do
/// nothing.
pub fn init_tracing_with(config: &ClientConfig, format: LogFormat) {
    let directive = default_directive(config);
    INIT_ONCE.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
        let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
        let _ = match format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
    });
}

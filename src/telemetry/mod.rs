use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

const DEFAULT_FILTER: &str = "video_translator=info,tower_http=info";
const VERBOSE_FILTER: &str = "video_translator=debug,tower_http=debug";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracingConfig {
    pub json_format: bool,
    pub verbose: bool,
}

impl TracingConfig {
    pub fn from_config(config: &Config, verbose: bool) -> Self {
        Self {
            json_format: config.logging.json,
            verbose,
        }
    }

    fn default_filter(&self) -> &'static str {
        if self.verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` takes precedence over the built-in filter.
pub fn init_tracing(config: TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    // try_init: a second call (tests, repeated CLI setup) keeps the first subscriber
    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(json_format = config.json_format, "Tracing initialized");
    }
}

//! Logging bootstrap.
//!
//! - Text or JSON output, RFC3339 (UTC) timestamps
//! - EnvFilter from an explicit directive, else RUST_LOG, else "info"
//! - `log` records are forwarded into `tracing`

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive such as "info,tiered_crowdsale=debug". `None` reads RUST_LOG.
    pub env_filter: Option<String>,
    pub format: LogFormat,
    /// Print target, file and line.
    pub with_targets_and_lines: bool,
    /// ANSI colours (text format only).
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { env_filter: None, format: LogFormat::Text, with_targets_and_lines: false, ansi: false }
    }
}

fn build_filter(directive: Option<&str>) -> EnvFilter {
    match directive {
        Some(s) => EnvFilter::try_new(s).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Install the global subscriber. Call once at process start.
/// Output goes to stderr so stdout stays reserved for results.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let _ = tracing_log::LogTracer::init();

    let filter = build_filter(cfg.env_filter.as_deref());

    let fmt_layer = {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(cfg.with_targets_and_lines)
            .with_file(cfg.with_targets_and_lines)
            .with_line_number(cfg.with_targets_and_lines)
            .with_timer(fmt::time::UtcTime::rfc_3339());

        match cfg.format {
            LogFormat::Json => base.json().with_ansi(false).with_current_span(true).flatten_event(true).boxed(),
            LogFormat::Text => base.with_ansi(cfg.ansi).boxed(),
        }
    };

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))
}

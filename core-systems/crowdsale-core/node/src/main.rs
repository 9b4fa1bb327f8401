//! crowdsale-node: load a sale configuration and replay a call script
//! against it, printing one JSON outcome per line and a final summary.

use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use crowdsale_node::{config, telemetry, LogFormat, LoggingConfig, Runner};

#[derive(Clone, Debug, Parser)]
#[command(name = "crowdsale-node", version)]
struct Cli {
    /// Config file (toml/yaml/json). Auto-discovered when omitted.
    #[arg(long, env = "CROWDSALE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-lines call script; stdin when omitted.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Log output format; overrides `telemetry.log_format`.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// EnvFilter directive, e.g. "info,tiered_crowdsale=debug"; overrides `telemetry.log_filter`.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load(cli.config.as_deref()).context("loading configuration")?;

    telemetry::init(&LoggingConfig {
        env_filter: Some(cli.log_level.clone().unwrap_or_else(|| cfg.telemetry.log_filter.clone())),
        format: cli.log_format.unwrap_or(cfg.telemetry.log_format),
        ..LoggingConfig::default()
    })?;

    let sale = cfg.sale.into_sale_config().context("validating sale configuration")?;
    info!(
        app = %cfg.app.name,
        env = %cfg.app.environment,
        start = sale.start_time,
        end = sale.end_time,
        tiers = sale.tiers.len(),
        "crowdsale configured"
    );

    let text = match &cli.script {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading script from stdin")?;
            buf
        }
    };

    let runner = Runner::new(sale)?;
    let outcomes = runner.run(&text).map_err(|e| {
        error!(error = %e, "script aborted");
        e
    })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for o in &outcomes {
        serde_json::to_writer(&mut out, o)?;
        writeln!(out)?;
    }
    let summary = runner.summary();
    serde_json::to_writer(&mut out, &serde_json::json!({ "summary": summary }))?;
    writeln!(out)?;

    let rejected = outcomes.iter().filter(|o| !o.ok).count();
    info!(steps = outcomes.len(), rejected, "script finished");
    Ok(())
}

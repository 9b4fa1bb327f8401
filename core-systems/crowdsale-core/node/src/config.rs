//! Configuration loader for the crowdsale node.
//!
//! Layers (highest precedence last):
//!   1) Built-in defaults
//!   2) Config file (explicit path or auto-discovered)
//!   3) Environment variables (optionally via .env), prefix `CROWDSALE__`
//!
//! Amounts are decimal strings in whole units ("0.01"), addresses are hex,
//! durations are humantime ("155days", "12h").

use std::path::{Path, PathBuf};
use std::time::Duration;

use config as cfg;
use directories::ProjectDirs;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tiered_crowdsale::{
    parse_units, reference_tiers, Address, AddressError, AmountError, PricingTier, SaleConfig, SaleError,
    DEFAULT_BONUS_BPS, REFERENCE_DURATION_SECS,
};

use crate::telemetry::LogFormat;

/// Node config (validated by `into_sale_config`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: App,
    pub sale: Sale,
    pub telemetry: Telemetry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub name: String,
    /// "prod" | "staging" | "dev".
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Sale {
    pub administrator: String,
    pub treasury: String,
    pub bonus_agent: String,
    /// Unix seconds.
    pub start_time: Option<u64>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub minimum_contribution: String,
    pub bonus_bps: u16,
    #[serde(with = "humantime_serde")]
    pub max_start_delay: Option<Duration>,
    pub tiers: Vec<Tier>,
}

/// Tier as written in config files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub threshold: String,
    pub rate: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// RUST_LOG-like directive, e.g. "info,tiered_crowdsale=debug".
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for App {
    fn default() -> Self {
        Self { name: "crowdsale-node".into(), environment: "dev".into() }
    }
}

impl Default for Sale {
    fn default() -> Self {
        Self {
            administrator: String::new(),
            treasury: String::new(),
            bonus_agent: String::new(),
            start_time: None,
            duration: Duration::from_secs(REFERENCE_DURATION_SECS),
            minimum_contribution: "0.01".into(),
            bonus_bps: DEFAULT_BONUS_BPS,
            max_start_delay: None,
            tiers: default_tiers(),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self { log_filter: "info".into(), log_format: LogFormat::Text }
    }
}

/// The reference tier table, rendered back to decimal strings.
fn default_tiers() -> Vec<Tier> {
    reference_tiers()
        .into_iter()
        .map(|t| Tier {
            threshold: tiered_crowdsale::format_units(t.threshold),
            rate: tiered_crowdsale::format_units(t.rate),
        })
        .collect()
}

/// Errors during configuration loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] cfg::ConfigError),
    #[error("path not found `{0}`")]
    PathNotFound(String),
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid address in `{field}`: {source}")]
    InvalidAddress { field: &'static str, source: AddressError },
    #[error("invalid amount in `{field}`: {source}")]
    InvalidAmount { field: String, source: AmountError },
    #[error("duration `{0}` is out of range")]
    Duration(&'static str),
    #[error("invalid sale parameters: {0}")]
    Sale(#[from] SaleError),
}

/// Load configuration: defaults → file(s) → environment.
/// Env prefix: `CROWDSALE__...`, nested fields separated by `__`.
///
/// Examples:
///   CROWDSALE__SALE__START_TIME=1700000000
///   CROWDSALE__SALE__BONUS_BPS=1500
///   CROWDSALE__TELEMETRY__LOG_FORMAT=json
pub fn load(explicit_file: Option<&Path>) -> Result<Config, ConfigError> {
    // .env is a developer convenience; absence is fine.
    let _ = dotenv();

    let defaults = Config::default();
    let mut builder = cfg::Config::builder()
        .set_default("app.name", defaults.app.name)?
        .set_default("app.environment", defaults.app.environment)?
        .set_default("sale.duration", "155days")?
        .set_default("sale.minimum_contribution", defaults.sale.minimum_contribution)?
        .set_default("sale.bonus_bps", i64::from(defaults.sale.bonus_bps))?
        .set_default("telemetry.log_filter", defaults.telemetry.log_filter)?
        .set_default("telemetry.log_format", "text")?;

    for path in discover_config_files(explicit_file)? {
        builder = builder.add_source(cfg::File::from(path));
    }

    // try_parsing turns numeric env values into numbers; amounts and
    // addresses still deserialize as strings.
    builder = builder.add_source(
        cfg::Environment::with_prefix("CROWDSALE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: Config = builder.build()?.try_deserialize()?;
    cfg.app.environment = cfg.app.environment.to_lowercase();
    Ok(cfg)
}

/// Discover config files in precedence order:
/// - explicit path if provided
/// - <platform config dir>/crowdsale-node/config.{yaml,yml,toml,json}
/// - ./crowdsale.{yaml,yml,toml,json}
fn discover_config_files(explicit: Option<&Path>) -> Result<Vec<PathBuf>, ConfigError> {
    if let Some(p) = explicit {
        if p.exists() {
            return Ok(vec![p.to_path_buf()]);
        }
        return Err(ConfigError::PathNotFound(p.display().to_string()));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(pd) = ProjectDirs::from("io", "Crowdsale", "crowdsale-node") {
        let cd = pd.config_dir();
        for ext in ["yaml", "yml", "toml", "json"] {
            candidates.push(cd.join(format!("config.{ext}")));
        }
    }
    for ext in ["yaml", "yml", "toml", "json"] {
        candidates.push(PathBuf::from(format!("crowdsale.{ext}")));
    }

    Ok(candidates.into_iter().filter(|c| c.exists()).collect())
}

fn address(field: &'static str, raw: &str) -> Result<Address, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    raw.trim().parse().map_err(|source| ConfigError::InvalidAddress { field, source })
}

fn amount(field: String, raw: &str) -> Result<u128, ConfigError> {
    parse_units(raw).map_err(|source| ConfigError::InvalidAmount { field, source })
}

impl Sale {
    /// Convert to the engine's configuration and validate it.
    pub fn into_sale_config(&self) -> Result<SaleConfig, ConfigError> {
        let start_time = self.start_time.ok_or(ConfigError::Missing("sale.start_time"))?;
        let end_time = start_time
            .checked_add(self.duration.as_secs())
            .ok_or(ConfigError::Duration("sale.duration"))?;

        let tiers = self
            .tiers
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Ok(PricingTier {
                    threshold: amount(format!("sale.tiers[{i}].threshold"), &t.threshold)?,
                    rate: amount(format!("sale.tiers[{i}].rate"), &t.rate)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let sale = SaleConfig {
            administrator: address("sale.administrator", &self.administrator)?,
            treasury: address("sale.treasury", &self.treasury)?,
            bonus_agent: address("sale.bonus_agent", &self.bonus_agent)?,
            start_time,
            end_time,
            minimum_contribution: amount("sale.minimum_contribution".into(), &self.minimum_contribution)?,
            bonus_bps: self.bonus_bps,
            max_start_delay: self.max_start_delay.map(|d| d.as_secs()),
            tiers,
        };
        sale.validate()?;
        Ok(sale)
    }
}

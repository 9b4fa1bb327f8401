//! Host process pieces: layered configuration, logging, an in-memory bank
//! and the JSON-lines script runner.

#![forbid(unsafe_code)]

pub mod bank;
pub mod config;
pub mod script;
pub mod telemetry;

pub use bank::MemoryBank;
pub use config::{Config, ConfigError};
pub use script::{Outcome, Runner, ScriptError, Summary};
pub use telemetry::{LogFormat, LoggingConfig};

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

const DEFAULT_REFRESH_MS: u64 = 31;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Display refresh period while running, in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_REFRESH_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_ms: u64,

    /// Where log output goes; the terminal is taken by the UI
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "laptimer=debug". RUST_LOG wins if set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub refresh_period: Duration,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            refresh_period: Duration::from_millis(args.refresh_ms),
            log_file: args
                .log_file
                .unwrap_or_else(|| std::env::temp_dir().join("laptimer.log")),
            log_level: args.log_level,
        }
    }
}

pub fn init_logging(config: &Config) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("can't open log file {}", config.log_file.display()))?;

    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("can't install logger")?;
    Ok(())
}

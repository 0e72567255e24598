use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::*;

use crate::error::{Error, Result};

/**
 * Runtime settings, read from the environment (and `.env` when present)
 */
#[derive(Clone, Debug)]
pub struct Settings {
    /**
     * Without a database url everything is kept in memory
     */
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub listen_addr: String,
    /**
     * Period of the background sweep, `None` disables it
     */
    pub sweep_interval: Option<Duration>,
    pub tally_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: 5,
            listen_addr: "127.0.0.1:8000".to_string(),
            sweep_interval: Some(Duration::from_secs(300)),
            tally_concurrency: 4,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /**
     * Build the settings from any key lookup, mostly so tests don't have to
     * touch the process environment
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let sweep_secs: u64 = parse(&lookup, "SWEEP_INTERVAL_SECS", 300)?;
        let sweep_interval = match sweep_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            pool_size: parse(&lookup, "DATABASE_POOL_SIZE", defaults.pool_size)?,
            listen_addr: lookup("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            sweep_interval,
            tally_concurrency: parse(&lookup, "TALLY_CONCURRENCY", defaults.tally_concurrency)?,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            warn!("Invalid {} value {:?}: {}", key, raw, e);
            Error::Config(format!("{} must be a number, got {:?}", key, raw))
        }),
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use chatdesk_api::state::Settings;
use chatdesk_gateway::waiter::{INITIAL_DELAY, MAX_CHECKS, MAX_WAITERS, POLL_INTERVAL, WaitConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("CHATDESK_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "CHATDESK_PORT", 3000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("CHATDESK_HOST/CHATDESK_PORT do not form an address: {}:{}", host, port))?;

        let db_path: PathBuf = lookup("CHATDESK_DB_PATH").unwrap_or_else(|| "chatdesk.db".into()).into();

        let wait = WaitConfig {
            initial_delay: millis_or(&lookup, "CHATDESK_POLL_INITIAL_MS", INITIAL_DELAY)?,
            poll_interval: millis_or(&lookup, "CHATDESK_POLL_INTERVAL_MS", POLL_INTERVAL)?,
            max_checks: parse_or(&lookup, "CHATDESK_POLL_MAX_CHECKS", MAX_CHECKS)?,
            max_waiters: parse_or(&lookup, "CHATDESK_MAX_WAITERS", MAX_WAITERS)?,
        };
        if wait.max_waiters == 0 {
            anyhow::bail!("CHATDESK_MAX_WAITERS must be at least 1");
        }

        let settings = Settings {
            require_fingerprint: parse_or(&lookup, "CHATDESK_REQUIRE_FINGERPRINT", false)?,
            live_window: Duration::from_secs(parse_or(&lookup, "CHATDESK_LIVE_WINDOW_SECS", 3600)?),
            wait,
        };

        Ok(Self {
            addr,
            db_path,
            settings,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}

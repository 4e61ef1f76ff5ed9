use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::resolver::DEFAULT_SERVICE;

pub const USAGE: &str = "Usage: lockplay [host] [service] [password]";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub service: String,
    pub password: Option<String>,
    /// Double the reconnect delay on consecutive failures.
    pub retry_backoff: bool,
    /// Queue play/pause requests that arrive while a command is in flight
    /// instead of dropping them.
    pub replace_in_flight: bool,
    /// LED class directory or brightness file to use as the indicator.
    pub led: Option<PathBuf>,
    /// Emit status reports as JSON lines on stdout.
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            service: DEFAULT_SERVICE.to_string(),
            password: None,
            retry_backoff: false,
            replace_in_flight: false,
            led: None,
            json: false,
        }
    }
}

impl Config {
    /// Build from command line arguments (program name excluded) and the
    /// process environment.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        Self::from_sources(args, |key| std::env::var(key).ok())
    }

    /// Positional arguments win over the environment, which wins over the
    /// defaults.
    pub fn from_sources<I, F>(args: I, env: F) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        if args.len() > 3 {
            bail!("Too many arguments\n{}", USAGE);
        }
        if let Some(flag) = args.iter().find(|a| a.starts_with('-')) {
            bail!("Unknown option {}\n{}", flag, USAGE);
        }
        let mut args = args.into_iter();

        let mut config = Config::default();
        let env = |key: &str| env(key).filter(|value| !value.is_empty());

        let mut host_password = None;
        if let Some(value) = env("MPD_HOST") {
            match value.rsplit_once('@') {
                Some((password, host)) => {
                    config.host = host.to_string();
                    host_password = Some(password.to_string());
                }
                None => config.host = value,
            }
        }
        if let Some(port) = env("MPD_PORT") {
            config.service = port;
        }
        config.password = env("MPD_PASSWORD").or(host_password);

        if let Some(host) = args.next() {
            config.host = host;
        }
        if let Some(service) = args.next() {
            config.service = service;
        }
        if let Some(password) = args.next() {
            config.password = Some(password);
        }

        config.retry_backoff = flag(env("LOCKPLAY_RETRY_BACKOFF"));
        config.replace_in_flight = flag(env("LOCKPLAY_REPLACE_IN_FLIGHT"));
        config.led = env("LOCKPLAY_LED").map(PathBuf::from);
        config.json = flag(env("LOCKPLAY_JSON"));

        if config.host.is_empty() {
            bail!("Empty host name\n{}", USAGE);
        }

        Ok(config)
    }
}

fn flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

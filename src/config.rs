//! Server configuration resolved from the environment

use crate::llm::ConfigError;
use crate::runtime::DEFAULT_SESSION_IDLE_TIMEOUT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Where to listen and how long idle sessions live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub session_idle_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unset or blank variables take their default; anything else must parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let idle_secs: Option<u64> = parse(&lookup, "LYNX_SESSION_IDLE_SECS")?;

        Ok(Self {
            bind: parse(&lookup, "LYNX_BIND")?.unwrap_or(DEFAULT_BIND),
            port: parse(&lookup, "LYNX_PORT")?.unwrap_or(DEFAULT_PORT),
            session_idle_timeout: idle_secs
                .filter(|secs| *secs > 0)
                .map_or(DEFAULT_SESSION_IDLE_TIMEOUT, Duration::from_secs),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid { name, value })
        }
        _ => Ok(None),
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus configuration from the process environment.
//!
//! Participants call [`load_dotenv`] once at startup (plain `KEY=VALUE`
//! file, `#` comments, existing variables overwritten) and then
//! [`BusConfig::from_env`]. Invalid values are startup errors; the bus
//! never guesses.
//!
//! | Variable        | Default       | Meaning                          |
//! |-----------------|---------------|----------------------------------|
//! | `EVENTS_ADDR`   | `239.255.0.1` | Event multicast group            |
//! | `EVENTS_PORT`   | `30001`       | Event group port                 |
//! | `CMD_ADDR`      | `239.255.0.2` | Command multicast group          |
//! | `CMD_PORT`      | `30002`       | Command group port               |
//! | `MCAST_IF_ADDR` | unset         | Interface to join groups on      |
//! | `MCAST_DEDUP`   | `1`           | Duplicate window on/off          |
//! | `MCAST_DEDUP_MS`| `100`         | Duplicate window, ms (1..=9999)  |
//!
//! `MD_SOURCE_HOST`/`MD_SOURCE_PORT`/`MD_SOURCE_PATH` and `SCRAPPY_FILE`
//! belong to the feed adapter and the file sink; those binaries read
//! them directly.

use crate::transport::ReceiverOptions;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

pub const DEFAULT_EVENTS_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);
pub const DEFAULT_EVENTS_PORT: u16 = 30001;
pub const DEFAULT_CMD_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 2);
pub const DEFAULT_CMD_PORT: u16 = 30002;

/// Link-local multicast; events are not meant to leave the segment.
pub const MULTICAST_TTL: u32 = 1;

pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 100;
const DEDUP_WINDOW_RANGE: std::ops::RangeInclusive<u64> = 1..=9999;

/// Configuration failure. Fatal at startup; the process exits 1 with the
/// rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAddr { var: &'static str, value: String },
    NotMulticast { var: &'static str, value: String },
    InvalidPort { var: &'static str, value: String },
    InvalidFlag { var: &'static str, value: String },
    DedupWindowOutOfRange { value: String },
    UnknownInstance { name: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddr { var, value } => {
                write!(f, "{}: '{}' is not an IPv4 address", var, value)
            }
            ConfigError::NotMulticast { var, value } => {
                write!(f, "{}: '{}' is not a multicast group", var, value)
            }
            ConfigError::InvalidPort { var, value } => {
                write!(f, "{}: '{}' is not a port number", var, value)
            }
            ConfigError::InvalidFlag { var, value } => {
                write!(f, "{}: '{}' is not 0 or 1", var, value)
            }
            ConfigError::DedupWindowOutOfRange { value } => {
                write!(f, "MCAST_DEDUP_MS: '{}' is outside 1..=9999", value)
            }
            ConfigError::UnknownInstance { name } => {
                write!(f, "unknown instance name '{}'", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a `.env`-style file into the process environment.
///
/// Missing file is not an error; malformed lines are skipped with a log
/// line. Values overwrite existing variables, matching the loader the
/// deployments already use.
pub fn load_dotenv(path: impl AsRef<Path>) {
    let file = match std::fs::File::open(path.as_ref()) {
        Ok(file) => file,
        Err(_) => return,
    };
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::debug!("[CONFIG] skipping malformed .env line: {}", line);
            continue;
        };
        std::env::set_var(key.trim(), value.trim());
    }
}

/// Resolved bus-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub events_addr: Ipv4Addr,
    pub events_port: u16,
    pub cmd_addr: Ipv4Addr,
    pub cmd_port: u16,
    pub mcast_if: Option<Ipv4Addr>,
    pub dedup: bool,
    pub dedup_window_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            events_addr: DEFAULT_EVENTS_ADDR,
            events_port: DEFAULT_EVENTS_PORT,
            cmd_addr: DEFAULT_CMD_ADDR,
            cmd_port: DEFAULT_CMD_PORT,
            mcast_if: None,
            dedup: true,
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
        }
    }
}

impl BusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let events_addr = group_var("EVENTS_ADDR", DEFAULT_EVENTS_ADDR)?;
        let events_port = port_var("EVENTS_PORT", DEFAULT_EVENTS_PORT)?;
        let cmd_addr = group_var("CMD_ADDR", DEFAULT_CMD_ADDR)?;
        let cmd_port = port_var("CMD_PORT", DEFAULT_CMD_PORT)?;

        let mcast_if = match std::env::var("MCAST_IF_ADDR") {
            Ok(value) => Some(value.parse::<Ipv4Addr>().map_err(|_| {
                ConfigError::InvalidAddr {
                    var: "MCAST_IF_ADDR",
                    value,
                }
            })?),
            Err(_) => None,
        };

        let dedup = match std::env::var("MCAST_DEDUP") {
            Ok(value) => match value.as_str() {
                "0" => false,
                "1" => true,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        var: "MCAST_DEDUP",
                        value,
                    })
                }
            },
            Err(_) => true,
        };

        let dedup_window_ms = match std::env::var("MCAST_DEDUP_MS") {
            Ok(value) => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::DedupWindowOutOfRange {
                        value: value.clone(),
                    })?;
                if !DEDUP_WINDOW_RANGE.contains(&parsed) {
                    return Err(ConfigError::DedupWindowOutOfRange { value });
                }
                parsed
            }
            Err(_) => DEFAULT_DEDUP_WINDOW_MS,
        };

        Ok(Self {
            events_addr,
            events_port,
            cmd_addr,
            cmd_port,
            mcast_if,
            dedup,
            dedup_window_ms,
        })
    }

    /// Receive-side options shared by both groups.
    #[must_use]
    pub fn receiver_options(&self) -> ReceiverOptions {
        ReceiverOptions {
            join_iface: self.mcast_if,
            dedup: self.dedup,
            dedup_window_ms: self.dedup_window_ms,
        }
    }
}

fn group_var(var: &'static str, default: Ipv4Addr) -> Result<Ipv4Addr, ConfigError> {
    let addr = match std::env::var(var) {
        Ok(value) => value
            .parse::<Ipv4Addr>()
            .map_err(|_| ConfigError::InvalidAddr { var, value })?,
        Err(_) => default,
    };
    if !addr.is_multicast() {
        return Err(ConfigError::NotMulticast {
            var,
            value: addr.to_string(),
        });
    }
    Ok(addr)
}

fn port_var(var: &'static str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Env-var tests share process state; run them against distinct
    // variables only through the file loader to stay order-independent.

    #[test]
    fn defaults_match_the_reference_deployment() {
        let config = BusConfig::default();
        assert_eq!(config.events_addr, Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(config.events_port, 30001);
        assert_eq!(config.cmd_addr, Ipv4Addr::new(239, 255, 0, 2));
        assert_eq!(config.cmd_port, 30002);
        assert!(config.dedup);
        assert_eq!(config.dedup_window_ms, 100);
    }

    #[test]
    fn dotenv_loader_sets_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        let path = dir.path().join(".env");
        let mut file = std::fs::File::create(&path).expect("create should succeed");
        writeln!(file, "# comment line").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "SEQBUS_TEST_DOTENV=first").unwrap();
        writeln!(file, "malformed line without equals").unwrap();
        writeln!(file, "SEQBUS_TEST_DOTENV=second").unwrap();

        load_dotenv(&path);
        assert_eq!(
            std::env::var("SEQBUS_TEST_DOTENV").as_deref(),
            Ok("second")
        );
        std::env::remove_var("SEQBUS_TEST_DOTENV");
    }

    #[test]
    fn missing_dotenv_is_silent() {
        load_dotenv("/nonexistent/.env");
    }

    #[test]
    fn group_var_rejects_unicast() {
        let err = group_var("SEQBUS_TEST_UNSET_GROUP", Ipv4Addr::new(10, 0, 0, 1))
            .expect_err("unicast default should be rejected");
        assert!(matches!(err, ConfigError::NotMulticast { .. }));
    }

    #[test]
    fn config_errors_render_the_variable() {
        let err = ConfigError::InvalidPort {
            var: "CMD_PORT",
            value: "70000".to_string(),
        };
        assert!(err.to_string().contains("CMD_PORT"));
        assert!(err.to_string().contains("70000"));
    }
}

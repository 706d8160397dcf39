// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant identity.
//!
//! Every participant owns one `InstanceId`, stable for the process
//! lifetime, resolved from a symbolic name at startup. Events carry the
//! originator's id as `sid` and the intended recipient's as `tin`;
//! `tin = 0` is a broadcast accepted by every consumer.

use crate::config::ConfigError;
use std::collections::HashMap;

/// Small unsigned participant identifier (varint on the wire).
pub type InstanceId = u64;

/// Reserved id of the sequencer itself.
pub const SEQUENCER_INSTANCE: InstanceId = 0;

/// Broadcast target: accepted by every event receiver.
pub const BROADCAST_INSTANCE: InstanceId = 0;

/// Name → id registry, fixed at construction.
///
/// Lookup is total over the configured set; an unknown name is a startup
/// error, never a runtime panic.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    map: HashMap<String, InstanceId>,
}

impl InstanceRegistry {
    /// The reference deployment's participant set.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::from_entries([
            ("SEQ", SEQUENCER_INSTANCE),
            ("SCRAPPY", 1),
            ("PING", 18),
            ("PONG", 81),
            ("MD", 4),
        ])
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, InstanceId)>) -> Self {
        Self {
            map: entries
                .into_iter()
                .map(|(name, id)| (name.to_string(), id))
                .collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<InstanceId, ConfigError> {
        self.map
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownInstance {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_resolves_known_names() {
        let registry = InstanceRegistry::with_defaults();
        assert_eq!(registry.lookup("SEQ").unwrap(), 0);
        assert_eq!(registry.lookup("SCRAPPY").unwrap(), 1);
        assert_eq!(registry.lookup("PING").unwrap(), 18);
        assert_eq!(registry.lookup("PONG").unwrap(), 81);
        assert_eq!(registry.lookup("MD").unwrap(), 4);
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        let registry = InstanceRegistry::with_defaults();
        let err = registry.lookup("NOSUCH").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownInstance {
                name: "NOSUCH".to_string()
            }
        );
    }

    #[test]
    fn custom_registry_overrides_the_table() {
        let registry = InstanceRegistry::from_entries([("ALPHA", 7), ("BETA", 9)]);
        assert_eq!(registry.lookup("ALPHA").unwrap(), 7);
        assert!(!registry.contains("SEQ"));
    }
}

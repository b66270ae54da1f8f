//! Snapshot/partial update merge contract.

use crate::model::configuration::{Configuration, SettingKey};
use crate::model::scalar::Scalar;

/// A change published by the Store.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Full configuration; replaces the previous one wholesale.
    Snapshot(Configuration),
    /// Subset of settings; merged key by key.
    Partial(Configuration),
}

impl Update {
    pub fn payload(&self) -> &Configuration {
        match self {
            Update::Snapshot(c) | Update::Partial(c) => c,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, Update::Snapshot(_))
    }

    /// Keys carried by this update together with their incoming values.
    pub fn touched(&self) -> impl Iterator<Item = (SettingKey, &Scalar)> {
        self.payload().entries()
    }
}

/// Apply `update` to `old`, returning the new configuration.
///
/// Partial updates overwrite only the `(category, setting)` pairs they carry
/// and add pairs that were not present; categories they do not mention are
/// kept untouched.
pub fn merge(old: &Configuration, update: &Update) -> Configuration {
    match update {
        Update::Snapshot(config) => config.clone(),
        Update::Partial(partial) => {
            let mut next = old.clone();
            for (key, value) in partial.entries() {
                next.set(&key, value.clone());
            }
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> Configuration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_partial_keeps_absent_categories() {
        let old = config(json!({
            "server": { "timeout_seconds": 30, "host": "localhost" },
            "features": { "caching_enabled": false }
        }));
        let update = Update::Partial(config(json!({ "server": { "timeout_seconds": 45 } })));

        let next = merge(&old, &update);

        assert_eq!(next.get("server", "timeout_seconds"), Some(&Scalar::from(45)));
        assert_eq!(next.get("server", "host"), Some(&Scalar::from("localhost")));
        assert_eq!(next.get("features", "caching_enabled"), Some(&Scalar::Bool(false)));
        // input untouched
        assert_eq!(old.get("server", "timeout_seconds"), Some(&Scalar::from(30)));
    }

    #[test]
    fn test_snapshot_replaces_wholesale() {
        let old = config(json!({
            "server": { "timeout_seconds": 30 },
            "features": { "caching_enabled": false }
        }));
        let snapshot = config(json!({ "server": { "timeout_seconds": 60 } }));

        let next = merge(&old, &Update::Snapshot(snapshot.clone()));

        assert_eq!(next, snapshot);
        assert!(next.category("features").is_none());
    }

    #[test]
    fn test_partial_adds_new_settings() {
        let old = config(json!({ "server": { "timeout_seconds": 30 } }));
        let update = Update::Partial(config(json!({ "logging": { "level": "debug" } })));

        let next = merge(&old, &update);
        assert_eq!(next.len(), 2);
        assert_eq!(next.get("logging", "level"), Some(&Scalar::from("debug")));
    }
}

//! Two-level nested configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::scalar::Scalar;

/// Settings of one category, in display order.
pub type Category = IndexMap<String, Scalar>;

/// Mapping of category name → setting name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(IndexMap<String, Category>);

/// Identifies one setting: `(category, setting)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingKey {
    pub category: String,
    pub setting: String,
}

impl SettingKey {
    pub fn new(category: impl Into<String>, setting: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            setting: setting.into(),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.setting)
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration holding exactly one setting. This is the shape of
    /// every write the Reconciler sends.
    pub fn single(key: &SettingKey, value: Scalar) -> Self {
        let mut config = Self::new();
        config.set(key, value);
        config
    }

    pub fn get(&self, category: &str, setting: &str) -> Option<&Scalar> {
        self.0.get(category).and_then(|c| c.get(setting))
    }

    pub fn get_key(&self, key: &SettingKey) -> Option<&Scalar> {
        self.get(&key.category, &key.setting)
    }

    pub fn contains(&self, key: &SettingKey) -> bool {
        self.get_key(key).is_some()
    }

    /// Insert or overwrite a setting, creating its category when missing.
    pub fn set(&mut self, key: &SettingKey, value: Scalar) -> Option<Scalar> {
        self.0
            .entry(key.category.clone())
            .or_default()
            .insert(key.setting.clone(), value)
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.0.get(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &Category)> {
        self.0.iter().map(|(name, settings)| (name.as_str(), settings))
    }

    /// Every `(key, value)` pair in display order.
    pub fn entries(&self) -> impl Iterator<Item = (SettingKey, &Scalar)> {
        self.0.iter().flat_map(|(category, settings)| {
            settings
                .iter()
                .map(move |(setting, value)| (SettingKey::new(category.as_str(), setting.as_str()), value))
        })
    }

    /// Number of settings across all categories.
    pub fn len(&self) -> usize {
        self.0.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_shape_and_order() {
        let config: Configuration = serde_json::from_value(json!({
            "server": { "timeout_seconds": 30, "host": "localhost" },
            "features": { "caching_enabled": true }
        }))
        .unwrap();

        let order: Vec<String> = config.entries().map(|(k, _)| k.to_string()).collect();
        assert_eq!(order, ["server.timeout_seconds", "server.host", "features.caching_enabled"]);
        assert_eq!(config.len(), 3);
        assert_eq!(config.get("features", "caching_enabled"), Some(&Scalar::Bool(true)));
    }

    #[test]
    fn test_rejects_deeper_nesting() {
        let result = serde_json::from_value::<Configuration>(json!({
            "server": { "limits": { "max": 3 } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_single_setting() {
        let key = SettingKey::new("server", "timeout_seconds");
        let config = Configuration::single(&key, Scalar::from(45));
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({"server": {"timeout_seconds": 45}}));
    }
}

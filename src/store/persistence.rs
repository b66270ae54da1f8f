//! Persistence of the Store configuration.
//!
//! The file format follows the extension: `.yaml` / `.yml` files are YAML,
//! anything else is TOML.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::model::Configuration;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
}

impl Format {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Toml,
        }
    }

    fn parse(self, content: &str) -> Result<Configuration, StoreError> {
        match self {
            Format::Toml => Ok(toml::from_str(content)?),
            // An empty YAML document is an empty configuration.
            Format::Yaml if content.trim().is_empty() => Ok(Configuration::new()),
            Format::Yaml => Ok(serde_yaml::from_str(content)?),
        }
    }

    fn render(self, config: &Configuration) -> Result<String, StoreError> {
        match self {
            Format::Toml => Ok(toml::to_string(config)?),
            Format::Yaml => Ok(serde_yaml::to_string(config)?),
        }
    }
}

/// Read the configuration file. A missing file yields an empty
/// configuration.
pub fn load(path: &Path) -> Result<Configuration, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Format::of(path).parse(&content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Configuration file not found, starting empty");
            Ok(Configuration::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write the whole configuration, replacing the file atomically.
pub fn save(path: &Path, config: &Configuration) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content = Format::of(path).render(config)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scalar;
    use serde_json::json;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config: Configuration = serde_json::from_value(json!({
            "server": { "timeout_seconds": 30, "ratio": 0.75, "host": "localhost" },
            "features": { "caching_enabled": true }
        }))
        .unwrap();

        save(&path, &config).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.get("server", "ratio"), Some(&Scalar::from(0.75)));
    }

    #[test]
    fn test_yaml_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.yaml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "server:\n  timeout_seconds: 30\n  host: localhost\nfeatures:\n  caching_enabled: false\n",
        )
        .unwrap();
        assert_eq!(Format::of(&path), Format::Yaml);

        let mut config = load(&path).unwrap();
        assert_eq!(config.get("server", "timeout_seconds"), Some(&Scalar::from(30)));
        assert_eq!(config.get("features", "caching_enabled"), Some(&Scalar::Bool(false)));

        config.set(&crate::model::SettingKey::new("server", "timeout_seconds"), Scalar::from(45));
        save(&path, &config).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("timeout_seconds: 45"));
        assert!(toml::from_str::<Configuration>(&written).is_err());
        assert_eq!(load(&path).unwrap(), config);
    }

    #[test]
    fn test_empty_yaml_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "").unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nlimits = [1, 2]\n").unwrap();
        assert!(matches!(load(&path), Err(StoreError::Parse(_))));
    }
}

//! Shell configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_render::PoolLimits;
use tessera_resize::ResizeLimits;
use tessera_system::SearchPath;

use crate::ConfigError;

/// Configuration options
///
/// Missing JSON fields take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `;`-separated resource prefixes
    pub resource_path: String,

    /// Decoded images kept before the least recently used is dropped
    pub max_loaded_images: usize,

    /// Image table sizing
    pub initial_image_slots: usize,
    pub image_slot_increment: usize,
    pub max_image_slots: usize,

    /// Widths above this are clamped when sizing meter strips
    pub strip_max_width: u32,

    /// Trace every background command
    pub debug_background_exec: bool,

    /// Default `tracing` filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let pool = PoolLimits::default();
        Self {
            resource_path: String::new(),
            max_loaded_images: pool.max_loaded_images,
            initial_image_slots: pool.initial_slots,
            image_slot_increment: pool.slot_increment,
            max_image_slots: pool.max_slots,
            strip_max_width: ResizeLimits::default().strip_max_width,
            debug_background_exec: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TESSERA_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    ///
    /// Recognized: `TESSERA_RESOURCE_PATH`, `TESSERA_DEBUG_BACKGROUND_EXEC`
    /// (`1`/`true`/`yes`) and `TESSERA_LOG`.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TESSERA_RESOURCE_PATH") {
            self.resource_path = path;
        }
        if let Some(flag) = lookup("TESSERA_DEBUG_BACKGROUND_EXEC") {
            self.debug_background_exec = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(filter) = lookup("TESSERA_LOG") {
            self.log_filter = filter;
        }
    }

    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            initial_slots: self.initial_image_slots,
            slot_increment: self.image_slot_increment,
            max_slots: self.max_image_slots,
            max_loaded_images: self.max_loaded_images,
        }
    }

    pub fn resize_limits(&self) -> ResizeLimits {
        ResizeLimits {
            strip_max_width: self.strip_max_width,
        }
    }

    pub fn search_path(&self) -> SearchPath {
        SearchPath::parse(&self.resource_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_loaded_images, 75);
        assert_eq!(config.initial_image_slots, 500);
        assert_eq!(config.image_slot_increment, 100);
        assert_eq!(config.max_image_slots, 2000);
        assert_eq!(config.strip_max_width, 1280);
        assert_eq!(config.pool_limits(), PoolLimits::default());
    }

    #[test]
    fn test_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.json");
        std::fs::write(&path, r#"{ "resource_path": "a/;b/", "max_loaded_images": 10 }"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.max_loaded_images, 10);
        assert_eq!(config.max_image_slots, 2000);
        assert_eq!(config.search_path().prefixes(), ["a/", "b/"]);
    }

    #[test]
    fn test_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::from_json_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TESSERA_RESOURCE_PATH", "skins/;share/"),
            ("TESSERA_DEBUG_BACKGROUND_EXEC", "True"),
            ("TESSERA_LOG", "tessera=debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.resource_path, "skins/;share/");
        assert!(config.debug_background_exec);
        assert_eq!(config.log_filter, "tessera=debug");

        config.apply_vars(|_| None);
        assert_eq!(config.log_filter, "tessera=debug");
    }
}

use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "REGISTRAR_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "registrar.toml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub dir: String,
    pub debug: bool,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        TemplateSettings {
            dir: "templates".to_string(),
            debug: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub migrations_dir: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: "sqlite://registrar.db?mode=rwc".to_string(),
            max_connections: 5,
            migrations_dir: "migrations".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub template: TemplateSettings,
    pub database: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
            template: TemplateSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text. Missing keys fall back to defaults.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Read settings from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        Self::from_toml(&text, &origin)
    }

    /// Load from `$REGISTRAR_CONFIG`, else `registrar.toml` if present, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            info!("Loading settings from {} ({})", path, CONFIG_ENV);
            return Self::from_file(path);
        }
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            info!("Loading settings from {}", DEFAULT_CONFIG_FILE);
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }
        info!("No config file found, using default settings");
        Ok(Settings::default())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

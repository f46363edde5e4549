//! Configuration of the Directory service.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::locale::{LocaleRegistry, LocaleSettings};
use crate::domain::types::TypeConstraintError;

/// Settings of the reverse-geocoding collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderSettings {
    /// Base URL of a Nominatim-compatible service.
    pub url: String,
    /// Request timeout; the call is attempted once.
    #[serde(default = "default_geocoder_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_geocoder_timeout_ms() -> u64 {
    3_000
}

fn default_user_agent() -> String {
    concat!("pushkind-directory/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Configuration options specific to the Directory service.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Path or URL of the SQLite database.
    pub database_url: String,
    pub locales: LocaleSettings,
    pub geocoder: GeocoderSettings,
}

impl DirectoryConfig {
    /// Loads configuration from an optional YAML file, overridden by
    /// `DIRECTORY__*` environment variables (for example
    /// `DIRECTORY__GEOCODER__URL`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database_url", "directory.db")?
            .set_default("locales.supported", vec!["en"])?
            .set_default("locales.default", "en")?
            .set_default("geocoder.url", "https://nominatim.openstreetmap.org")?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("DIRECTORY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("locales.supported")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Supported-locale registry built from [`Self::locales`].
    pub fn locale_registry(&self) -> Result<LocaleRegistry, TypeConstraintError> {
        LocaleRegistry::try_from(&self.locales)
    }
}

//! # configs
//!
//! Layered settings for the Rovel server. Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `config/rovel.toml` (or the path in `ROVEL_CONFIG`), optional
//! 3. `ROVEL__SECTION__KEY` environment variables
//! 4. the `PORT` and `DATABASE_URL` shorthands
//!
//! Call [`load_dotenv`] before [`Settings::load`] so a `.env` file feeds the
//! environment layers.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "config/rovel";
const ENV_PREFIX: &str = "ROVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub paths: PathSettings,
    pub works: WorkSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Connection string; redacted from `Debug` output.
    #[serde(default)]
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

impl StoreSettings {
    pub fn url(&self) -> Option<&str> {
        self.url.as_ref().map(|url| url.expose_secret())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathSettings {
    /// Directory holding the `*.json` seed files.
    pub seed_dir: PathBuf,
    /// Directory served for `/`, `/admin` and other static assets.
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkSettings {
    /// Insert attempts per work creation when concurrent creates collide.
    pub create_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

/// Loads the nearest `.env` into the process environment and returns its
/// path. A missing file is not an error; the caller decides how loudly to
/// report a broken one.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    found(dotenvy::dotenv())
}

/// [`load_dotenv`] for an explicit file.
pub fn load_dotenv_from(path: &Path) -> Result<Option<PathBuf>, dotenvy::Error> {
    found(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn found(result: Result<PathBuf, dotenvy::Error>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

impl Settings {
    /// Loads settings from every source, see the module docs.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("ROVEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut builder = Self::defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("store.url", url)?;
        }

        Self::build(builder)
    }

    /// Defaults overlaid with a TOML document only.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Self::build(Self::defaults()?.add_source(File::from_str(source, FileFormat::Toml)))
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("store.backend", "memory")?
            .set_default("store.max_connections", 10)?
            .set_default("paths.seed_dir", "data")?
            .set_default("paths.static_dir", "public")?
            .set_default("works.create_attempts", 3)?
            .set_default("log.filter", "info")?
            .set_default("log.format", "pretty")?)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.works.create_attempts == 0 {
            return Err(ConfigError::Invalid(
                "works.create_attempts must be at least 1".into(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "store.max_connections must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.store.url().is_none() {
            return Err(ConfigError::Invalid(
                "store.url (or DATABASE_URL) is required for the postgres backend".into(),
            ));
        }
        Ok(())
    }
}

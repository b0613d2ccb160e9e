//! # Configuration
//!
//! Layered settings: built-in defaults, then `config/nestboard.toml` if it
//! exists, then `NESTBOARD__SECTION__KEY` environment variables. A `.env` file
//! is loaded into the environment first. The server and the seed tool both
//! read their settings through here.

use config::{Config, Environment, File};
use nb_core::BoardSettings;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("board.topics_per_page must be greater than zero")]
    ZeroPageSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct BoardConfig {
    pub topics_per_page: u32,
    pub load_db_lastread: bool,
    pub load_db_track: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// Salt mixed into every stored API secret digest.
    pub secret_salt: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub board: BoardConfig,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/nestboard")
    }

    /// Same layering as `load`, with the optional file at `file`.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self::with_defaults(Config::builder())?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("NESTBOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(builder
            .set_default("server.bind", "127.0.0.1:8080")?
            .set_default("database.url", "sqlite:nestboard.db")?
            .set_default("board.topics_per_page", 25)?
            .set_default("board.load_db_lastread", true)?
            .set_default("board.load_db_track", true)?
            .set_default("auth.secret_salt", "")?
            .set_default("log.format", "pretty")?)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        if settings.board.topics_per_page == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(settings)
    }

    pub fn board_settings(&self) -> BoardSettings {
        BoardSettings {
            topics_per_page: self.board.topics_per_page,
            load_db_lastread: self.board.load_db_lastread,
            load_db_track: self.board.load_db_track,
        }
    }
}

//! # mw-config
//!
//! Layered service configuration:
//!
//! 1. built-in defaults
//! 2. `config/memory-wall.toml` (optional)
//! 3. environment, `MEMORY_WALL__SECTION__KEY` (after `.env` is loaded)
//!
//! `MEMORY_WALL__DATABASE__URL=sqlite://wall.db` → `database.url`

use anyhow::{ensure, Context};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use mw_core::settings::{self as limits, GuestbookSettings};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "MEMORY_WALL";
pub const CONFIG_FILE: &str = "config/memory-wall";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub guestbook: GuestbookConfig,
    pub admin: AdminConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker threads; 0 lets actix pick one per core
    pub workers: usize,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded blobs are written to
    pub root: PathBuf,
    /// Public path the directory is served from
    pub url_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestbookConfig {
    pub max_file_bytes: u64,
    pub max_video_duration_secs: u64,
    pub self_delete_window_secs: u64,
    pub recording_countdown_secs: u64,
    pub rotation_range_deg: f32,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    /// Argon2 PHC string; empty disables admin access
    pub password_hash: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info,mw_api=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Settings {
    /// Loads `.env`, the optional config file and the environment.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let config = defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let settings: Self = config.try_deserialize().context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with a TOML document; no file or environment lookups.
    pub fn from_toml(toml: &str) -> anyhow::Result<Self> {
        let settings: Self = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let g = &self.guestbook;
        ensure!(g.max_file_bytes > 0, "guestbook.max_file_bytes must be positive");
        ensure!(g.max_video_duration_secs > 0, "guestbook.max_video_duration_secs must be positive");
        ensure!(g.page_size > 0, "guestbook.page_size must be positive");
        ensure!(
            g.rotation_range_deg.is_finite() && g.rotation_range_deg >= 0.0,
            "guestbook.rotation_range_deg must be a non-negative number"
        );
        ensure!(self.database.max_connections > 0, "database.max_connections must be positive");
        ensure!(
            self.media.url_prefix.starts_with('/'),
            "media.url_prefix must be an absolute path"
        );
        Ok(())
    }

    pub fn guestbook(&self) -> GuestbookSettings {
        let g = &self.guestbook;
        GuestbookSettings {
            max_file_bytes: g.max_file_bytes,
            max_video_duration: Duration::from_secs(g.max_video_duration_secs),
            self_delete_window: Duration::from_secs(g.self_delete_window_secs),
            recording_countdown: Duration::from_secs(g.recording_countdown_secs),
            rotation_range_deg: g.rotation_range_deg,
            page_size: g.page_size,
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

fn defaults() -> anyhow::Result<ConfigBuilder<DefaultState>> {
    let builder = config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.workers", 0)?
        .set_default("server.cors_origins", Vec::<String>::new())?
        .set_default("database.url", "sqlite://data/memory-wall.db")?
        .set_default("database.max_connections", 5)?
        .set_default("media.root", "data/media")?
        .set_default("media.url_prefix", "/media")?
        .set_default("guestbook.max_file_bytes", limits::DEFAULT_MAX_FILE_BYTES)?
        .set_default("guestbook.max_video_duration_secs", limits::DEFAULT_MAX_VIDEO_DURATION.as_secs())?
        .set_default("guestbook.self_delete_window_secs", limits::DEFAULT_SELF_DELETE_WINDOW.as_secs())?
        .set_default("guestbook.recording_countdown_secs", limits::DEFAULT_RECORDING_COUNTDOWN.as_secs())?
        .set_default("guestbook.rotation_range_deg", f64::from(limits::DEFAULT_ROTATION_RANGE_DEG))?
        .set_default("guestbook.page_size", limits::DEFAULT_PAGE_SIZE as u64)?
        .set_default("admin.username", "admin")?
        .set_default("admin.password_hash", "")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;
    Ok(builder)
}

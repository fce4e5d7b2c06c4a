//! # memory-wall binary
//!
//! Assembles the wall from the plugins selected with cargo features.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use mw_api::middleware::{cors_policy, security_headers, standard_middleware};
use mw_api::{configure_routes, AppState};
use mw_config::Settings;
use mw_core::clock::SystemClock;
use mw_core::probe::ContainerProbe;
use mw_core::traits::{AuthProvider, EntryStore, MediaStore};
#[cfg(feature = "auth-simple")]
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(not(any(feature = "db-sqlite", feature = "db-memory")))]
compile_error!("enable one of the `db-sqlite` or `db-memory` features");

#[cfg(not(any(feature = "storage-local", feature = "storage-memory")))]
compile_error!("enable one of the `storage-local` or `storage-memory` features");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Helper commands produce config values, so they must not depend on config.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(output) = run_command(&args)? {
        println!("{output}");
        return Ok(());
    }

    let settings = Settings::load()?;
    init_tracing(&settings)?;

    let entries = entry_store(&settings).await?;
    let media = media_store(&settings).await?;
    let auth = auth_provider(&settings);

    let state = web::Data::new(AppState::new(
        settings.guestbook(),
        entries,
        media,
        auth,
        Arc::new(ContainerProbe),
        Arc::new(SystemClock),
    ));

    let (host, port) = settings.bind_addr();
    let cors_origins = settings.server.cors_origins.clone();
    let media_mount = media_mount(&settings);
    info!(%host, port, "memory wall starting");

    let mut server = HttpServer::new(move || {
        let app = App::new()
            .app_data(state.clone())
            .wrap(security_headers())
            .wrap(cors_policy(&cors_origins))
            .wrap(standard_middleware())
            .configure(configure_routes);
        match &media_mount {
            Some((prefix, root)) => app.service(actix_files::Files::new(prefix, root.clone())),
            None => app,
        }
    });
    if settings.server.workers > 0 {
        server = server.workers(settings.server.workers);
    }

    server
        .bind((host.as_str(), port))
        .with_context(|| format!("Failed to bind {host}:{port}"))?
        .run()
        .await
        .context("HTTP server failed")
}

fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log.level))
        .context("Invalid log.level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if settings.log.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}

/// Runs a helper command, if one was given. `Ok(None)` means serve.
fn run_command(args: &[String]) -> anyhow::Result<Option<String>> {
    let Some(command) = args.first() else {
        return Ok(None);
    };
    match command.as_str() {
        #[cfg(feature = "auth-simple")]
        "hash-password" => {
            let password = args.get(1).context("usage: memory-wall hash-password <password>")?;
            Ok(Some(mw_auth_simple::hash_password(password)?))
        }
        other => anyhow::bail!("unknown command: {other}"),
    }
}

#[cfg(feature = "db-sqlite")]
async fn entry_store(settings: &Settings) -> anyhow::Result<Arc<dyn EntryStore>> {
    let db = &settings.database;
    let store = mw_db_sqlite::SqliteEntryStore::new(&db.url, db.max_connections).await?;
    Ok(Arc::new(store))
}

#[cfg(all(feature = "db-memory", not(feature = "db-sqlite")))]
async fn entry_store(_settings: &Settings) -> anyhow::Result<Arc<dyn EntryStore>> {
    info!("using in-memory entry store; entries are lost on restart");
    Ok(Arc::new(mw_store_memory::MemoryEntryStore::new()))
}

#[cfg(feature = "storage-local")]
async fn media_store(settings: &Settings) -> anyhow::Result<Arc<dyn MediaStore>> {
    let media = &settings.media;
    tokio::fs::create_dir_all(&media.root)
        .await
        .with_context(|| format!("Failed to create media root {}", media.root.display()))?;
    Ok(Arc::new(mw_storage_local::LocalMediaStore::new(
        media.root.clone(),
        media.url_prefix.clone(),
    )))
}

#[cfg(all(feature = "storage-memory", not(feature = "storage-local")))]
async fn media_store(_settings: &Settings) -> anyhow::Result<Arc<dyn MediaStore>> {
    info!("using in-memory media store; blobs are not served over HTTP");
    Ok(Arc::new(mw_store_memory::MemoryMediaStore::new()))
}

/// Where local media files are served from, if they are on disk.
fn media_mount(settings: &Settings) -> Option<(String, std::path::PathBuf)> {
    if cfg!(feature = "storage-local") {
        Some((settings.media.url_prefix.clone(), settings.media.root.clone()))
    } else {
        None
    }
}

#[cfg(feature = "auth-simple")]
fn auth_provider(settings: &Settings) -> Arc<dyn AuthProvider> {
    let admin = &settings.admin;
    let hash = SecretString::from(admin.password_hash.expose_secret().to_owned());
    let provider = mw_auth_simple::SimpleAuthProvider::new(admin.username.clone(), hash);
    if !provider.is_configured() {
        tracing::warn!("admin.password_hash is not set; admin deletes are disabled");
    }
    Arc::new(provider)
}

#[cfg(not(feature = "auth-simple"))]
fn auth_provider(_settings: &Settings) -> Arc<dyn AuthProvider> {
    Arc::new(NoAdmin)
}

/// Used when no auth plugin is compiled in: nobody is an admin.
#[cfg(not(feature = "auth-simple"))]
struct NoAdmin;

#[cfg(not(feature = "auth-simple"))]
#[async_trait::async_trait]
impl AuthProvider for NoAdmin {
    async fn check_credentials(&self, _username: &str, _password: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_serve() {
        assert!(run_command(&[]).unwrap().is_none());
    }

    #[cfg(feature = "auth-simple")]
    #[tokio::test]
    async fn hash_password_needs_no_config() {
        // Unparseable config must not stop the helper that fills it in.
        std::env::set_var("MEMORY_WALL__SERVER__PORT", "not-a-port");
        assert!(Settings::load().is_err());

        let hash = run_command(&args(&["hash-password", "let-me-in"])).unwrap().unwrap();
        let provider = mw_auth_simple::SimpleAuthProvider::new("host", SecretString::from(hash));
        assert!(provider.check_credentials("host", "let-me-in").await);
        std::env::remove_var("MEMORY_WALL__SERVER__PORT");
    }

    #[cfg(feature = "auth-simple")]
    #[test]
    fn hash_password_requires_a_password() {
        assert!(run_command(&args(&["hash-password"])).is_err());
    }

    #[test]
    fn unknown_commands_are_refused() {
        assert!(run_command(&args(&["serve-forever"])).is_err());
    }
}

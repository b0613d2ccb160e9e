//! # nestboard Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;

use anyhow::Context;
use nb_api::AppState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[cfg(feature = "db-sqlite")]
use nb_db_sqlite::SqliteBoardRepo;

#[cfg(feature = "auth-simple")]
use nb_auth_simple::SimpleAuthProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "auth-simple")))]
compile_error!("nestboard needs a store and an auth provider: enable `db-sqlite` and `auth-simple`");

use nestboard::settings::{LogFormat, Settings};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(settings.log.format);

    // 1. Store
    let repo = Arc::new(
        SqliteBoardRepo::new(&settings.database.url)
            .await
            .with_context(|| format!("failed to open database {}", settings.database.url))?,
    );

    // 2. Sessions
    let auth = SimpleAuthProvider::new(repo.clone(), settings.auth.secret_salt.clone());

    // 3. Wrap in AppState (dynamic dispatch keeps the plugins swappable)
    let state = Arc::new(AppState {
        forums: repo.clone(),
        tracking: repo.clone(),
        posting: repo.clone(),
        accounts: repo,
        auth: Arc::new(auth),
        settings: settings.board_settings(),
    });

    let listener = TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind))?;
    info!(bind = %settings.server.bind, "nestboard listening");

    axum::serve(listener, nb_api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("nestboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

//! # Rovel Binary
//!
//! Assembles the server from settings: store backend, seeding, services and
//! the axum router.

mod telemetry;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use api_adapters::ApiState;
use configs::{Settings, StoreBackend, StoreSettings};
use domains::ContentStore;
use services::{seed_if_empty, AppContext, ContextOptions};
use storage_adapters::MemoryStore;

#[cfg(feature = "db-postgres")]
use storage_adapters::PgStore;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = run().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run() -> anyhow::Result<()> {
    let dotenv = configs::load_dotenv();
    let settings = Settings::load().context("load settings")?;
    telemetry::init(&settings.log)?;
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env file"),
    }
    tracing::info!(?settings, "starting rovel");

    let store = open_store(&settings.store).await?;

    let report = seed_if_empty(store.as_ref(), &settings.paths.seed_dir)
        .await
        .context("seed store")?;
    tracing::info!(?report, seed_dir = %settings.paths.seed_dir.display(), "seeding finished");

    let ctx = Arc::new(AppContext::new(
        store,
        ContextOptions {
            create_attempts: settings.works.create_attempts,
        },
    ));
    let works = ctx.aggregate.rebuild().await.context("build aggregate view")?;
    tracing::info!(works = works.len(), "aggregate view ready");

    let static_dir = settings.paths.static_dir.clone();
    let static_dir = static_dir.is_dir().then_some(static_dir);
    if static_dir.is_none() {
        tracing::warn!(dir = %settings.paths.static_dir.display(), "static directory missing, serving the API only");
    }
    let app = api_adapters::router(ApiState::new(ctx), static_dir.as_deref());

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| format!("parse listen address {}:{}", settings.server.host, settings.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "listening, admin panel at /admin");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    tracing::info!("shut down");
    Ok(())
}

async fn open_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn ContentStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "db-postgres")]
        StoreBackend::Postgres => {
            let url = settings
                .url()
                .context("store.url is required for the postgres backend")?;
            let store = PgStore::connect(url, settings.max_connections)
                .await
                .context("connect to postgres")?;
            tracing::info!(max_connections = settings.max_connections, "connected to postgres");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-postgres"))]
        StoreBackend::Postgres => {
            anyhow::bail!("postgres backend requested but rovel was built without `db-postgres`")
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

use anyhow::Context;
use libris_db::Database;
use libris_http::App;
use libris_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// Open the configured store. Failing here aborts startup.
pub async fn connect(settings: &Settings) -> anyhow::Result<Database> {
    let db = Database::connect(&settings.database.url)
        .await
        .with_context(|| format!("failed to connect to store at '{}'", settings.database.url))?;
    tracing::info!(db = %settings.database.url, "connected to store");
    Ok(db)
}

/// Register and initialize every module against `db`.
pub async fn build_registry(settings: &Settings, db: &Database) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings, db)?;

    let ctx = InitCtx { settings, db };
    registry.init_modules(&ctx).await?;
    Ok(registry)
}

/// Service serving every module, as mounted by `run`.
pub async fn build_app(settings: &Settings, db: &Database) -> anyhow::Result<App> {
    let registry = build_registry(settings, db).await?;
    Ok(libris_http::router::into_app(libris_http::build_router(&registry, settings)))
}

/// Connect, initialize modules, serve until shutdown, then stop modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let db = connect(&settings).await?;
    let registry = build_registry(&settings, &db).await?;

    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    registry.start_modules(&ctx).await?;

    let served = libris_http::start_server(&registry, &settings).await;
    registry.stop_modules().await?;
    served?;

    tracing::info!("libris-app shut down");
    Ok(())
}

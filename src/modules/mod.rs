pub mod books;

use libris_db::Database;
use libris_kernel::{settings::Settings, ModuleRegistry};

/// Register all project-specific modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    settings: &Settings,
    db: &Database,
) -> anyhow::Result<()> {
    registry.register(books::create_module(db, &settings.database.collection))?;
    Ok(())
}

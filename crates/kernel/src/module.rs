use async_trait::async_trait;
use axum::Router;
use libris_db::Database;
use serde_json::Value;

use crate::settings::Settings;

/// Shared handles passed to every lifecycle hook that needs them.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
    pub db: &'a Database,
}

/// A unit of API surface mounted at `/api/{name}`.
///
/// The registry runs `init` on every module, then `start` on every module,
/// then serves; `stop` runs in reverse registration order on shutdown.
#[async_trait]
pub trait Module: Sync + Send {
    /// Mount point and registry key. Must be unique.
    fn name(&self) -> &'static str;

    /// Prepare collections or check the store. An error aborts startup.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with `paths` relative to the mount point and any
    /// `components.schemas` the paths reference.
    fn openapi(&self) -> Option<Value> {
        None
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

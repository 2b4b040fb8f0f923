pub mod handlers;
pub mod models;
pub mod query;
pub mod repository;
pub mod schema;

mod openapi;

use async_trait::async_trait;
use axum::{routing::get, Router};
use libris_db::{Database, Filter};
use libris_kernel::{InitCtx, Module};
use std::sync::Arc;

use repository::BookRepository;

/// Book catalog: CRUD, search, structured filter and sidebar facets
pub struct BooksModule {
    books: BookRepository,
}

impl BooksModule {
    pub fn new(books: BookRepository) -> Self {
        Self { books }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let stored = self.books.count(&Filter::All).await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            collection = %ctx.settings.database.collection,
            stored,
            "books module initialized"
        );
        Ok(())
    }

    /// Literal paths are registered ahead of `/{id}`.
    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(handlers::list_books).post(handlers::create_books))
            .route("/search", get(handlers::search_books))
            .route("/filter", get(handlers::filter_books))
            .route("/sidebar", get(handlers::sidebar))
            .route(
                "/{id}",
                get(handlers::get_book)
                    .put(handlers::update_book)
                    .delete(handlers::delete_book),
            )
            .with_state(self.books.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi::document())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module backed by `collection` in `db`
pub fn create_module(db: &Database, collection: &str) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(BookRepository::new(db, collection)))
}

//! Document store used by libris.
//!
//! A [`Database`] is opened from a connection string (`memory://` or
//! `file://<path>`) and hands out [`Collection`] handles. Every write to a
//! collection passes through the [`Schema`] the handle was created with, so
//! persisted documents always satisfy it.

mod collection;
mod database;
mod document;
mod error;
mod filter;
mod schema;

pub use collection::{Collection, Group};
pub use database::{Backend, Database};
pub use document::{compare_fields, Document, FieldRef};
pub use error::{DbError, DbResult, FieldError};
pub use filter::{Filter, FindOptions, Sort, SortDirection};
pub use schema::{DeclaredSchema, FieldKind, Schema};

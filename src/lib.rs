//! Libris application library
//!
//! The `books` module plus the bootstrap shared by the `libris-app` and
//! `libris` binaries.

pub mod bootstrap;
pub mod modules;

pub use bootstrap::{build_app, connect, run};

//! Stored shape of a book.

use libris_db::{DeclaredSchema, FieldKind};

pub const TITLE: &str = "title";
pub const AUTHOR: &str = "author";
pub const GENRE: &str = "genre";
pub const PUBLISHED_YEAR: &str = "publishedYear";

/// Fields a client may sort by, as accepted in `sort`, and the stored field
/// each maps to.
pub const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("id", "_id"),
    ("_id", "_id"),
    (TITLE, TITLE),
    (AUTHOR, AUTHOR),
    (GENRE, GENRE),
    (PUBLISHED_YEAR, PUBLISHED_YEAR),
    ("createdAt", "createdAt"),
    ("updatedAt", "updatedAt"),
];

/// All four fields are required; `publishedYear` is an integer.
pub fn book_schema() -> DeclaredSchema {
    DeclaredSchema::new("Book")
        .required(TITLE, FieldKind::Text)
        .required(AUTHOR, FieldKind::Text)
        .required(GENRE, FieldKind::Text)
        .required(PUBLISHED_YEAR, FieldKind::Integer)
}

pub fn sort_field(name: &str) -> Option<&'static str> {
    SORTABLE_FIELDS
        .iter()
        .find(|(accepted, _)| *accepted == name)
        .map(|(_, stored)| *stored)
}

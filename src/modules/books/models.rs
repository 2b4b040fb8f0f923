use libris_db::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored book as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Identifier assigned by the store
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Schema-conformed body of a book document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookFields {
    title: String,
    author: String,
    genre: String,
    published_year: i64,
}

impl TryFrom<Document> for Book {
    type Error = serde_json::Error;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let fields: BookFields = serde_json::from_value(Value::Object(doc.fields))?;
        Ok(Self {
            id: doc.id,
            title: fields.title,
            author: fields.author,
            genre: fields.genre,
            published_year: fields.published_year,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

/// Request or response carrying either a single item or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// One distinct value of a field and how many books share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet<T> {
    pub name: T,
    pub count: u64,
}

/// Facet lists backing the catalog sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidebar {
    pub authors: Vec<Facet<String>>,
    pub genres: Vec<Facet<String>>,
    pub years: Vec<Facet<i64>>,
}

/// One page of filter results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deleted {
    pub message: String,
}

use std::sync::Arc;

use libris_db::{Collection, Database, DbError, Filter, FindOptions, Group, SortDirection};
use libris_http::error::AppError;
use serde_json::{Map, Value};
use thiserror::Error;

use super::models::{Book, Facet, OneOrMany, Page, Sidebar};
use super::query::{BookQuery, SearchQuery};
use super::schema::{book_schema, AUTHOR, GENRE, PUBLISHED_YEAR};

#[derive(Debug, Error)]
pub enum BookStoreError {
    #[error(transparent)]
    Store(#[from] DbError),

    #[error("stored book does not match the book shape: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<BookStoreError> for AppError {
    fn from(err: BookStoreError) -> Self {
        match err {
            BookStoreError::Store(err) => err.into(),
            malformed @ BookStoreError::Malformed(_) => AppError::Internal(malformed.into()),
        }
    }
}

pub type BookResult<T> = Result<T, BookStoreError>;

/// Typed access to the books collection.
#[derive(Clone)]
pub struct BookRepository {
    collection: Collection,
}

impl BookRepository {
    pub fn new(db: &Database, collection: &str) -> Self {
        Self {
            collection: db.collection(collection, Arc::new(book_schema())),
        }
    }

    pub async fn list(&self) -> BookResult<Vec<Book>> {
        self.find(&Filter::All, &FindOptions::default()).await
    }

    pub async fn get(&self, id: &str) -> BookResult<Option<Book>> {
        self.collection
            .find_by_id(id)
            .await?
            .map(Book::try_from)
            .transpose()
            .map_err(Into::into)
    }

    /// Insert one book or a batch; a batch is stored only if every entry is valid.
    pub async fn create(&self, input: OneOrMany<Map<String, Value>>) -> BookResult<OneOrMany<Book>> {
        match input {
            OneOrMany::One(body) => {
                let doc = self.collection.insert_one(body).await?;
                Ok(OneOrMany::One(Book::try_from(doc)?))
            }
            OneOrMany::Many(bodies) => {
                let docs = self.collection.insert_many(bodies).await?;
                let books = docs
                    .into_iter()
                    .map(Book::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(OneOrMany::Many(books))
            }
        }
    }

    /// Partial update: fields absent from `patch` keep their stored value.
    pub async fn update(&self, id: &str, patch: Map<String, Value>) -> BookResult<Option<Book>> {
        self.collection
            .update_by_id(id, patch)
            .await?
            .map(Book::try_from)
            .transpose()
            .map_err(Into::into)
    }

    pub async fn delete(&self, id: &str) -> BookResult<Option<Book>> {
        self.collection
            .delete_by_id(id)
            .await?
            .map(Book::try_from)
            .transpose()
            .map_err(Into::into)
    }

    pub async fn search(&self, query: &SearchQuery) -> BookResult<Vec<Book>> {
        self.find(&query.filter(), &FindOptions::default()).await
    }

    pub async fn filter(&self, query: &BookQuery) -> BookResult<Page<Book>> {
        let filter = query.filter();
        let options = query.find_options();
        let (results, total) = tokio::try_join!(
            self.find(&filter, &options),
            self.count(&filter),
        )?;

        Ok(Page {
            page: query.page,
            limit: query.limit,
            total,
            total_pages: query.total_pages(total),
            results,
        })
    }

    pub async fn count(&self, filter: &Filter) -> BookResult<u64> {
        Ok(self.collection.count(filter).await?)
    }

    /// Author, genre and year facets over the whole collection.
    pub async fn sidebar(&self) -> BookResult<Sidebar> {
        let (authors, genres, years) = tokio::try_join!(
            self.collection.group_count(AUTHOR, SortDirection::Ascending),
            self.collection.group_count(GENRE, SortDirection::Ascending),
            self.collection.group_count(PUBLISHED_YEAR, SortDirection::Descending),
        )?;

        Ok(Sidebar {
            authors: facets(authors)?,
            genres: facets(genres)?,
            years: facets(years)?,
        })
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> BookResult<Vec<Book>> {
        self.collection
            .find(filter, options)
            .await?
            .into_iter()
            .map(|doc| Book::try_from(doc).map_err(Into::into))
            .collect()
    }
}

fn facets<T: serde::de::DeserializeOwned>(groups: Vec<Group>) -> BookResult<Vec<Facet<T>>> {
    groups
        .into_iter()
        .map(|group| -> BookResult<Facet<T>> {
            Ok(Facet {
                name: serde_json::from_value(group.value)?,
                count: group.count,
            })
        })
        .collect()
}
